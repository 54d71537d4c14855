use tokenward::logger::*;

fn main() -> anyhow::Result<()> {
    let logger = Logger::new_bootstrap();
    trace!("bootstrap trace log");
    debug!("bootstrap debug log");
    info!("bootstrap info log");

    let config = LogConfig {
        filter: "tokenward=trace,warn".to_string(),
    };
    logger.reload_from_config(&config)?;
    trace!("application trace log");
    debug!(request_id = "demo", "application debug log");
    warn!("application warn log");

    // an invalid directive is reported, the previous filter stays active
    let broken = LogConfig {
        filter: "tokenward=[".to_string(),
    };
    if let Err(e) = logger.reload_from_config(&broken) {
        info!("rejected filter: {}", e);
    }

    Ok(())
}
