//! Coordinate data model.
//!
//! A [Coordinate3D] is a picked particle position inside one tomogram (a 3D
//! reconstructed volume), in pixel units of that volume. A [CoordinateSet] is
//! the collection the clustering works on: it carries the acquisition
//! metadata (box size, sampling rate) and a reference to the set of
//! tomograms the coordinates were picked from, so that derived sets can copy
//! this information verbatim.

use indexmap::IndexMap;

/// A picked 3D position inside a tomogram.
#[derive(Debug, Clone, PartialEq)]
pub struct Coordinate3D {
    /// object id, opaque to the clustering. Unique inside one set.
    obj_id: u64,
    /// name of the volume (tomogram) the coordinate belongs to
    vol_name: String,
    x: f64,
    y: f64,
    z: f64,
    /// cluster tag set on output coordinates. 0 means not assigned.
    group_id: u32,
} // end of struct Coordinate3D

impl Coordinate3D {
    pub fn new(obj_id: u64, vol_name: &str, x: f64, y: f64, z: f64) -> Self {
        Coordinate3D {
            obj_id,
            vol_name: String::from(vol_name),
            x,
            y,
            z,
            group_id: 0,
        }
    } // end of new

    pub fn get_obj_id(&self) -> u64 {
        self.obj_id
    }

    pub fn get_vol_name(&self) -> &str {
        &self.vol_name
    }

    pub fn get_x(&self) -> f64 {
        self.x
    }

    pub fn get_y(&self) -> f64 {
        self.y
    }

    pub fn get_z(&self) -> f64 {
        self.z
    }

    pub fn get_group_id(&self) -> u32 {
        self.group_id
    }

    pub fn set_group_id(&mut self, group_id: u32) {
        self.group_id = group_id;
    }

    /// position as an array, in the axis order used by the adjacency test
    pub fn position(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
} // end of impl Coordinate3D

//==========================================================================

/// A set of 3D coordinates with the metadata of the set they were picked
/// from. Derived (output) sets must carry the same box size and sampling
/// rate as the input set, not recomputed values.
#[derive(Debug, Clone)]
pub struct CoordinateSet {
    /// reference (by name) to the set of tomograms the coordinates belong to
    precedents: String,
    /// discriminating suffix of derived sets, empty for a root set
    suffix: String,
    /// particle box size in voxels
    box_size: u32,
    /// sampling rate in Angstrom/pixel
    sampling_rate: f64,
    items: Vec<Coordinate3D>,
} // end of struct CoordinateSet

impl CoordinateSet {
    pub fn new(precedents: &str, box_size: u32, sampling_rate: f64) -> Self {
        CoordinateSet {
            precedents: String::from(precedents),
            suffix: String::new(),
            box_size,
            sampling_rate,
            items: Vec::<Coordinate3D>::new(),
        }
    } // end of new

    /// the factory for derived sets: a fresh empty set pointing to the same
    /// precedents, discriminated by a suffix. Metadata is not copied here,
    /// callers go through [copy_info](Self::copy_info).
    pub fn derive_empty(&self, suffix: &str) -> Self {
        CoordinateSet {
            precedents: self.precedents.clone(),
            suffix: String::from(suffix),
            box_size: 0,
            sampling_rate: 0.,
            items: Vec::<Coordinate3D>::new(),
        }
    } // end of derive_empty

    /// copy box size and sampling rate verbatim from another set
    pub fn copy_info(&mut self, other: &CoordinateSet) {
        self.box_size = other.box_size;
        self.sampling_rate = other.sampling_rate;
    }

    pub fn append(&mut self, coord: Coordinate3D) {
        self.items.push(coord);
    }

    pub fn iter_coordinates(&self) -> std::slice::Iter<'_, Coordinate3D> {
        self.items.iter()
    }

    pub fn get_first_item(&self) -> Option<&Coordinate3D> {
        self.items.first()
    }

    pub fn get_items(&self) -> &[Coordinate3D] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get_precedents(&self) -> &str {
        &self.precedents
    }

    pub fn get_suffix(&self) -> &str {
        &self.suffix
    }

    pub fn get_box_size(&self) -> u32 {
        self.box_size
    }

    pub fn set_box_size(&mut self, box_size: u32) {
        self.box_size = box_size;
    }

    pub fn get_sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    pub fn set_sampling_rate(&mut self, sampling_rate: f64) {
        self.sampling_rate = sampling_rate;
    }
} // end of impl CoordinateSet

//==========================================================================

/// One pass grouping of coordinates by owning tomogram.
/// The map keeps tomograms in order of first appearance in the input, so a
/// run over the groups visits tomograms in the order they were picked.
/// There is never any adjacency across groups.
pub fn group_by_tomogram(coords: &[Coordinate3D]) -> IndexMap<String, Vec<Coordinate3D>> {
    let mut groups = IndexMap::<String, Vec<Coordinate3D>>::new();
    for coord in coords {
        groups
            .entry(String::from(coord.get_vol_name()))
            .or_default()
            .push(coord.clone());
    }
    log::debug!(
        "group_by_tomogram : {} coordinates in {} tomograms",
        coords.len(),
        groups.len()
    );
    groups
} // end of group_by_tomogram

//==========================================================================

// end of mod tests
