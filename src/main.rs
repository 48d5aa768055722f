use std::time::Instant;
use pretty_toa::ThousandsSep;
use structopt::StructOpt;
use tokio::runtime::Runtime;
use fitfusion::config::Config;
use fitfusion::server::{self, App};

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let run_start = Instant::now();
    dotenv::dotenv().ok();

    let config = Config::from_args();

    fitfusion::logging::init(&config.log_filter);

    if config.jwt_secret_key.is_none() {
        tracing::warn!("JWT_SECRET_KEY is not set, signing with a random secret; tokens will not survive a restart");
    }

    let rt = Runtime::new()?;

    rt.block_on(async {
        let app = App::new(&config).await?;

        let counts = app.db().table_counts().await?;

        tracing::info!(
            "opened {} with {} users, {} generated workouts, {} logged workouts ({} exercises) in {:?}",
            config.database_url,
            counts.users.thousands_sep(),
            counts.history.thousands_sep(),
            counts.workouts.thousands_sep(),
            counts.exercises.thousands_sep(),
            Instant::now() - run_start,
        );

        let routes = server::routes(app);

        tracing::info!(bind = %config.bind, "listening");

        warp::serve(routes).run(config.bind).await;

        Ok::<(), Box<dyn std::error::Error>>(())
    })?;

    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("fitfusion-server: {}", e);
        std::process::exit(1);
    }
}
