// for logging (debug mostly, switched at run time with RUST_LOG)

use lazy_static::lazy_static;

pub mod clustering;
pub mod coordset;
pub mod graphlaplace;
pub mod io;


lazy_static! {
    static ref LOG: u64 = init_log();
}

// install a logger facility
fn init_log() -> u64 {
    let _res = env_logger::try_init();
    log::info!("\n ************** initializing logger *****************\n");
    1
}

// end of tests
