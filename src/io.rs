//! To take charge of io: coordinate csv input, cluster csv output and the
//! per tomogram matrix dumps.
//!
//! The dumps mirror what the xmipptomo protocol leaves next to a run
//! (adjacency, degree, laplacian, eigenvector and eigenvalue matrices as
//! plain text) and exist for auditing only, the layout is not a contract.

use log::*;

use anyhow::anyhow;

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::str::FromStr;

use num_traits::Float;

use ndarray::{Array1, Array2};

use csv::*;

use crate::coordset::{Coordinate3D, CoordinateSet};
use crate::graphlaplace::{GraphLaplacian, LaplacianSpectrum};

// count number of first lines beginning with '#' or '%'
pub(crate) fn get_header_size(filepath: &Path) -> anyhow::Result<usize> {
    //
    log::debug!("get_header_size");
    //
    let fileres = OpenOptions::new().read(true).open(filepath);
    if fileres.is_err() {
        log::error!(
            "fn get_header_size : could not open file {:?}",
            filepath.as_os_str()
        );
        return Err(anyhow!(
            "fn get_header_size : could not open file {}",
            filepath.display()
        ));
    }
    let mut file = fileres?;
    let mut nb_header_lines = 0;
    let mut c = [0];
    let mut more = true;
    while more {
        if file.read_exact(&mut c).is_err() {
            // empty file or all header
            break;
        }
        if ['#', '%'].contains(&(c[0] as char)) {
            nb_header_lines += 1;
            loop {
                if file.read_exact(&mut c).is_err() {
                    // header line without trailing newline at end of file
                    more = false;
                    break;
                }
                if c[0] == b'\n' {
                    break;
                }
            }
        } else {
            more = false;
            log::debug!("file has {} nb headers lines", nb_header_lines);
        }
    }
    //
    Ok(nb_header_lines)
} // end of get_header_size

/// get coordinate records from a csv file.
/// Each line of the file must have 4 fields: the tomogram (volume) name
/// and the x, y, z position, with some standard csv delimiter.
/// A header is possible with lines beginning with '#' or '%'.
pub fn get_coordinates_from_csv<F>(filepath: &Path, delim: u8) -> anyhow::Result<Vec<(String, F, F, F)>>
where
    F: FromStr + Float,
{
    //
    let nb_headers_line = get_header_size(filepath)?;
    log::info!("get_coordinates_from_csv , got header nb lines {}", nb_headers_line);
    let fileres = OpenOptions::new().read(true).open(filepath);
    if fileres.is_err() {
        log::error!(
            "get_coordinates_from_csv could not open file {:?}",
            filepath.as_os_str()
        );
        return Err(anyhow!(
            "get_coordinates_from_csv could not open file {}",
            filepath.display()
        ));
    }
    let file = fileres?;
    let mut bufreader = BufReader::new(file);
    // skip header lines
    let mut headerline = String::new();
    for _ in 0..nb_headers_line {
        bufreader.read_line(&mut headerline)?;
    }
    //
    let mut num_record: usize = 0;
    let mut coordinates = Vec::<(String, F, F, F)>::new();
    //
    let mut rdr = ReaderBuilder::new()
        .delimiter(delim)
        .flexible(false)
        .has_headers(false)
        .from_reader(bufreader);
    for result in rdr.records() {
        num_record += 1;
        let record = result?;
        if record.len() != 4 {
            log::error!(
                "record {} has {} fields, expecting tomogram,x,y,z ; check the delimiter, got {:?} as delimiter",
                num_record,
                record.len(),
                delim as char
            );
            return Err(anyhow!(
                "record {} has {} fields, expecting tomogram,x,y,z",
                num_record,
                record.len()
            ));
        }
        let vol_name = record.get(0).unwrap().trim();
        let mut position = [F::zero(); 3];
        for (j, p) in position.iter_mut().enumerate() {
            let field = record.get(1 + j).unwrap().trim();
            if let Ok(val) = field.parse::<F>() {
                *p = val;
            } else {
                log::error!(
                    "error decoding field {} of record {}, field : {:?}",
                    1 + j,
                    num_record,
                    field
                );
                return Err(anyhow!(
                    "error decoding field {} of record {}, field : {:?}",
                    1 + j,
                    num_record,
                    field
                ));
            }
        }
        coordinates.push((String::from(vol_name), position[0], position[1], position[2]));
    }
    log::info!("got {} coordinate records", coordinates.len());
    Ok(coordinates)
} // end of get_coordinates_from_csv

/// read a whole [CoordinateSet] from a csv file, object ids assigned from
/// record order (1-based). The precedents reference is the file stem.
pub fn read_coordinate_set(
    filepath: &Path,
    delim: u8,
    box_size: u32,
    sampling_rate: f64,
) -> anyhow::Result<CoordinateSet> {
    let records = get_coordinates_from_csv::<f64>(filepath, delim)?;
    let precedents = filepath
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut set = CoordinateSet::new(&precedents, box_size, sampling_rate);
    for (ix, (vol_name, x, y, z)) in records.iter().enumerate() {
        set.append(Coordinate3D::new(1 + ix as u64, vol_name, *x, *y, *z));
    }
    Ok(set)
} // end of read_coordinate_set

//==========================================================================

/// This function dumps an array2 into a space delimited text file
pub fn write_matrix_txt(filepath: &Path, mat: &Array2<f64>) -> anyhow::Result<()> {
    //
    let mut csv_writer = WriterBuilder::new().delimiter(b' ').from_path(filepath)?;
    let (nbrow, nbcol) = mat.dim();
    let mut line: Vec<String> = (0..nbcol).map(|_| String::from("")).collect();
    for i in 0..nbrow {
        for j in 0..nbcol {
            line[j] = format!("{:.18e}", mat[[i, j]]);
        }
        csv_writer.write_record(&line)?;
    }
    csv_writer.flush()?;
    //
    Ok(())
} // end of write_matrix_txt

/// one value per line, numpy savetxt style
pub fn write_vector_txt(filepath: &Path, vec: &Array1<f64>) -> anyhow::Result<()> {
    //
    let mut csv_writer = WriterBuilder::new().delimiter(b' ').from_path(filepath)?;
    for v in vec.iter() {
        csv_writer.write_record([format!("{:.18e}", v)])?;
    }
    csv_writer.flush()?;
    //
    Ok(())
} // end of write_vector_txt

// dump files are named after the basename of the volume
fn vol_short_name(vol_name: &str) -> String {
    Path::new(vol_name)
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from(vol_name))
} // end of vol_short_name

/// audit dumps of one tomogram group: adjacency, degree, laplacian,
/// eigenvector and eigenvalue matrices, one text file each.
pub fn dump_group_matrices(
    dir: &Path,
    vol_name: &str,
    adjacency: &Array2<f64>,
    laplacian: &GraphLaplacian,
    spectrum: &LaplacianSpectrum,
) -> anyhow::Result<()> {
    let short = vol_short_name(vol_name);
    log::debug!("dumping matrices for tomogram {} in {:?}", short, dir);
    std::fs::create_dir_all(dir)?;
    write_matrix_txt(&dir.join(format!("adjacency_matrix_{}", short)), adjacency)?;
    let degree = Array2::from_diag(laplacian.get_degrees());
    write_matrix_txt(&dir.join(format!("degree_matrix_{}", short)), &degree)?;
    write_matrix_txt(
        &dir.join(format!("laplacian_matrix_{}", short)),
        laplacian.get_matrix(),
    )?;
    write_matrix_txt(
        &dir.join(format!("eigenvecs_matrix_{}", short)),
        &spectrum.vectors,
    )?;
    write_vector_txt(
        &dir.join(format!("eigenvalues_matrix_{}", short)),
        &spectrum.values,
    )?;
    Ok(())
} // end of dump_group_matrices

/// dump clustered coordinates in a csv file, one record by coordinate:
/// group id, tomogram, x, y, z
pub fn write_clusters_csv(filepath: &Path, outputs: &[CoordinateSet]) -> anyhow::Result<usize> {
    //
    let mut csv_writer = Writer::from_path(filepath)?;
    let mut nb_record = 0;
    for outset in outputs {
        for coord in outset.iter_coordinates() {
            csv_writer.write_record([
                coord.get_group_id().to_string(),
                String::from(coord.get_vol_name()),
                format!("{:.5e}", coord.get_x()),
                format!("{:.5e}", coord.get_y()),
                format!("{:.5e}", coord.get_z()),
            ])?;
            nb_record += 1;
        }
    }
    csv_writer.flush()?;
    //
    Ok(nb_record)
} // end of write_clusters_csv

//==========================================================================

// end of mod tests
