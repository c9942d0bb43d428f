use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("aces {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: aces");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "build_target: {}",
        option_env!("ACES_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("features: cli=true");
    println!(
        "protocol: handshake={}/{} telemetry={}B",
        String::from_utf8_lossy(&aces_frame::CONNECT_REQUEST),
        String::from_utf8_lossy(&aces_frame::CONNECT_REPLY),
        aces_frame::MAX_PAYLOAD
    );

    Ok(SUCCESS)
}
