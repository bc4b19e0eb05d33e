//! tomocc binary.
//!
//! Clusters picked 3D coordinates into connected components, per tomogram.
//! Command syntax is:
//!  tomocc --csv csvfile --distance d [--out | -o output_name] [--delim char] [--dumpdir dir]
//!
//!  --csv      : input csv file, one record by coordinate : tomogram,x,y,z.
//!    Header lines beginning with '#' or '%' are skipped.
//!
//!  --distance : maximum per axis distance (in voxels) between two
//!    coordinates of the same connected component. If omitted it defaults
//!    to three times the box size, which must then be given.
//!
//!  --boxsize  : particle box size in voxels, stored in the output set
//!    metadata and used for the default distance.
//!
//!  --sampling : sampling rate in Angstrom/pixel, stored in the output set
//!    metadata. Defaults to 1.0.
//!
//!  --out or -o to specify the name of the csv file containing the clustered
//!    coordinates (group,tomogram,x,y,z). By default the name is "tomocc_clusters.csv".
//!
//!  --dumpdir  : optional directory receiving the per tomogram adjacency,
//!    degree, laplacian, eigenvector and eigenvalue matrix dumps.

use cpu_time::ProcessTime;
use std::time::SystemTime;

use clap::{Arg, ArgAction, Command};

use tomocc::clustering::ClusterFinder;
use tomocc::io::{read_coordinate_set, write_clusters_csv};

pub fn main() {
    env_logger::Builder::from_default_env().init();
    log::info!("initializing default logger from environment ...");
    //
    let matches = Command::new("tomocc")
        .about("Connected components of picked 3D coordinates in electron tomograms, via the graph laplacian spectrum")
        .version("0.1.0")
        .arg_required_else_help(true)
        .arg(
            Arg::new("csvfile")
                .long("csv")
                .action(ArgAction::Set)
                .value_parser(clap::value_parser!(String))
                .required(true)
                .help("expecting a csv file with records tomogram,x,y,z"),
        )
        .arg(
            Arg::new("distance")
                .long("distance")
                .short('d')
                .required(false)
                .action(ArgAction::Set)
                .value_parser(clap::value_parser!(f64))
                .help("maximum per axis distance in voxels inside one component"),
        )
        .arg(
            Arg::new("boxsize")
                .long("boxsize")
                .required(false)
                .action(ArgAction::Set)
                .value_parser(clap::value_parser!(u32))
                .help("particle box size in voxels, default distance is 3 times this"),
        )
        .arg(
            Arg::new("sampling")
                .long("sampling")
                .required(false)
                .action(ArgAction::Set)
                .value_parser(clap::value_parser!(f64))
                .default_value("1.0")
                .help("sampling rate in Angstrom/pixel"),
        )
        .arg(
            Arg::new("outfile")
                .long("out")
                .short('o')
                .required(false)
                .action(ArgAction::Set)
                .value_parser(clap::value_parser!(String))
                .help("expecting output file name"),
        )
        .arg(
            Arg::new("delim")
                .long("delim")
                .required(false)
                .action(ArgAction::Set)
                .value_parser(clap::value_parser!(char))
                .help("delimiter can be ' ', ','"),
        )
        .arg(
            Arg::new("dumpdir")
                .long("dumpdir")
                .required(false)
                .action(ArgAction::Set)
                .value_parser(clap::value_parser!(String))
                .help("directory for per tomogram matrix dumps"),
        )
        .get_matches();

    //
    let csv_file = matches.get_one::<String>("csvfile").unwrap();
    //
    let delim_opt = matches.get_one::<char>("delim");
    let delim = match delim_opt {
        Some(c) => *c as u8,
        None => b',',
    };
    //
    let box_size = matches.get_one::<u32>("boxsize").copied().unwrap_or(0);
    let sampling_rate = *matches.get_one::<f64>("sampling").unwrap();
    // the picker wizard proposes 3 times the box size as distance
    let distance = match matches.get_one::<f64>("distance") {
        Some(d) => *d,
        None => {
            if box_size == 0 {
                log::error!("either --distance or --boxsize must be given");
                std::process::exit(1);
            }
            3. * box_size as f64
        }
    };
    log::info!("distance threshold : {:.3e} voxels", distance);
    // set output filename and check if option is present in command
    let mut csv_output = String::from("tomocc_clusters.csv");
    let csv_out = matches.get_one::<String>("outfile");
    if let Some(out) = csv_out {
        csv_output.clone_from(out);
    }
    log::info!("output file : {:?}", &csv_output);
    //
    let filepath = std::path::Path::new(&csv_file);
    let res = read_coordinate_set(filepath, delim, box_size, sampling_rate);
    if res.is_err() {
        log::error!(
            "could not read coordinates from file {:?} : {}",
            filepath,
            res.err().unwrap()
        );
        std::process::exit(1);
    }
    let input = res.unwrap();
    log::info!("csv file {} read, {} coordinates", csv_file, input.len());
    //
    let mut finder = ClusterFinder::new(distance);
    if let Some(dumpdir) = matches.get_one::<String>("dumpdir") {
        finder.set_dump_dir(std::path::Path::new(dumpdir));
    }
    //
    let cpu_start = ProcessTime::now();
    let sys_now = SystemTime::now();
    let res = finder.run(&input);
    if res.is_err() {
        log::error!("clustering failed : {}", res.err().unwrap());
        std::process::exit(1);
    }
    let outputs = res.unwrap();
    log::info!(
        " clustering sys time(ms) {:?} cpu time(ms) {:?}",
        sys_now.elapsed().unwrap().as_millis(),
        cpu_start.elapsed().as_millis()
    );
    println!(
        "{} coordinates clustered into {} connected components",
        input.len(),
        outputs.len()
    );
    //
    let res = write_clusters_csv(std::path::Path::new(&csv_output), &outputs);
    match res {
        Ok(nb_record) => {
            log::info!("dumped {} records in csv file {}", nb_record, csv_output);
        }
        Err(e) => {
            log::error!("could not write output csv {} : {}", csv_output, e);
            std::process::exit(1);
        }
    }
} // end of main
