use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use thumbgrid::{LogRenderer, SessionBuilder};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "thumbgrid", about = "Lay out a directory as a masonry thumbnail grid")]
struct Cli {
    /// Directory to open
    dir: PathBuf,

    /// Viewport width in terminal cells
    #[arg(default_value_t = 120)]
    columns: usize,

    /// Viewport height in terminal cells
    #[arg(default_value_t = 40)]
    rows: usize,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("thumbgrid=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match run(&cli.dir, cli.columns, cli.rows).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("thumbgrid: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Lay out `dir`, generate thumbnails for the first page and print the grid.
async fn run(dir: &Path, columns: usize, rows: usize) -> Result<()> {
    let mut session = SessionBuilder::new()
        .viewport(columns, rows)
        .build(LogRenderer::default())?;
    session
        .open(dir)
        .await
        .with_context(|| format!("Failed to open {:?}", dir))?;

    session.run_until_idle().await;

    let grid = session.grid();
    info!(
        columns = grid.columns,
        cell_width = grid.cell_width,
        total_height = grid.total_height,
        thumbnails = session.renderer().placements().len(),
        "Grid settled"
    );
    for (item, geom) in session.items().iter().zip(grid.geometries()) {
        println!(
            "{:>3} {:>6} {:>4} {} {}",
            geom.column,
            geom.y,
            geom.height,
            if geom.estimated { "~" } else { " " },
            item.name
        );
    }

    session.close();
    Ok(())
}
