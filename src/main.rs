#[cfg(not(target_arch = "wasm32"))]
mod cli {
    use std::path::PathBuf;
    use std::process::ExitCode;

    use clap::{ArgAction, Parser};
    use log::info;

    use spyplot::config::DEFAULT_IMAGE_SIZE;
    use spyplot::layout::DEFAULT_MARKER_SIZE;
    use spyplot::{read_spy_file, render_matrix, OutputBackend, PartitionStats, RenderConfig};

    #[derive(Parser)]
    #[command(name = "spyplot")]
    #[command(about = "Plot the nonzero pattern of a distributed sparse matrix, colored by owning processor.", long_about = None)]
    struct Args {
        /// Spy file to plot.
        #[arg(value_name = "SPY_FILE")]
        spy_file: PathBuf,

        /// Write the plot to FILE; the format follows the extension (.png or .svg).
        #[arg(short = 'o', long = "output", value_name = "FILE", help_heading = "Output")]
        output: Option<PathBuf>,

        /// Output backend [default: window, or inferred from --output].
        #[arg(short = 'b', long = "backend", value_enum, help_heading = "Output")]
        backend: Option<OutputBackend>,

        /// Image width in pixels (also the initial window width).
        #[arg(long = "width", value_name = "PX", default_value_t = DEFAULT_IMAGE_SIZE.0, help_heading = "Output")]
        width: u32,

        /// Image height in pixels (also the initial window height).
        #[arg(long = "height", value_name = "PX", default_value_t = DEFAULT_IMAGE_SIZE.1, help_heading = "Output")]
        height: u32,

        /// Marker side as a fraction of a cell, in (0, 1].
        #[arg(short = 'm', long = "marker-size", value_name = "F", default_value_t = DEFAULT_MARKER_SIZE, help_heading = "Appearance")]
        marker_size: f64,

        /// Leave out title, axes and tick labels in exported images.
        #[arg(long = "bare", help_heading = "Appearance")]
        bare: bool,

        /// Extend the axes one cell past the last row and column, so its markers show in full.
        #[arg(long = "include-last-cell", help_heading = "Appearance")]
        include_last_cell: bool,

        /// Print partition statistics as JSON and exit.
        #[arg(long = "stats")]
        stats: bool,

        /// Increase verbosity (-v info, -vv debug).
        #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
        verbose: u8,
    }

    fn run(args: Args) -> spyplot::Result<()> {
        let matrix = read_spy_file(&args.spy_file)?;

        if args.stats {
            let json = PartitionStats::from_matrix(&matrix)
                .to_json()
                .map_err(std::io::Error::from)?;
            println!("{}", json);
            return Ok(());
        }

        let backend = OutputBackend::resolve(args.backend, args.output.as_deref())?;
        let config = RenderConfig {
            marker_size: args.marker_size,
            backend,
            output: args.output,
            image_size: (args.width, args.height),
            annotate: !args.bare,
            include_last_cell: args.include_last_cell,
        };

        if let Some(path) = render_matrix(&matrix, &args.spy_file, &config)? {
            info!("Wrote {}", path.display());
        }
        Ok(())
    }

    pub fn main() -> ExitCode {
        let args = Args::parse();

        // Initialize logger based on verbosity
        env_logger::Builder::new()
            .filter_level(match args.verbose {
                0 => log::LevelFilter::Warn,
                1 => log::LevelFilter::Info,
                _ => log::LevelFilter::Debug,
            })
            .init();

        match run(args) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("error: {}", e);
                ExitCode::FAILURE
            }
        }
    }

}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> std::process::ExitCode {
    cli::main()
}

// The browser build is driven through SpyViewerHandle
#[cfg(target_arch = "wasm32")]
fn main() {}
