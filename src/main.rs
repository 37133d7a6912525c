use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use liaz_gallery_dl::command::{exit_code, is_cancellation, Args};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    // 注册后 Ctrl+C 不再直接结束进程
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n\nCTRL+C pressed, canceling...");
            token.cancel();
        }
    });

    eprintln!("Starting liaz-gallery-dl instance.");
    let result = args.cmd.run(&args.config, cancel).await;
    if let Err(error) = &result {
        if is_cancellation(error) {
            log::warn!("download cancelled");
        } else {
            eprintln!("\n\nliaz-gallery-dl terminated unexpectedly.");
            for cause in error.chain() {
                eprintln!(" > {}", cause);
            }
        }
    }
    eprintln!("\n\nliaz-gallery-dl finished.");
    ExitCode::from(exit_code(&result))
}
