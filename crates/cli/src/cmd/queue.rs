use anyhow::{Context, Result};

use checkbuild_lib::queue::QueueServer;

use crate::output::{print_info, print_stat, print_success};

pub fn cmd_queue(addr: &str, path: &str) -> Result<()> {
  let rt = super::runtime()?;
  rt.block_on(async {
    let server = QueueServer::start(addr, path)
      .await
      .context("Failed to start queue server")?;

    print_success(&format!("Queue listening on {}", server.url()));
    print_stat("Routes", &format!("{}/{}/{{external_id}}", server.url(), path.trim_matches('/')));
    print_info("Press Ctrl-C to stop");

    tokio::signal::ctrl_c()
      .await
      .context("Failed to wait for Ctrl-C")?;

    let remaining = server.queue().len();
    server.shutdown().await.context("Failed to stop queue server")?;
    print_success(&format!("Queue stopped with {} message(s) left", remaining));
    Ok::<_, anyhow::Error>(())
  })
}
