use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("netsdr {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: netsdr");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target: {}", env!("NETSDR_BUILD_TARGET"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "rustc: {}",
        option_env!("RUSTC_VERSION").unwrap_or("unknown")
    );
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "features: session={}, cli=true",
        cfg!(feature = "session")
    );
    println!(
        "ports: control={}, data={}",
        netsdr_transport::DEFAULT_CONTROL_PORT,
        netsdr_transport::DEFAULT_DATA_PORT
    );

    Ok(SUCCESS)
}
