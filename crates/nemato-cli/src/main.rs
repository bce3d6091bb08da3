//! Nemato command-line interface.
//!
//! Run jobs from TOML configuration files:
//! ```sh
//! nemato illuminate job.toml
//! nemato tensor job.toml -o eps.npy
//! nemato inspect output/nemato.dtmf
//! nemato validate job.toml
//! nemato materials
//! ```
//!
//! Logging goes through `env_logger`; set `RUST_LOG=debug` for details.

mod config;
mod runner;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use nemato_core::io::{load_field, save_field_data};

#[derive(Parser)]
#[command(name = "nemato")]
#[command(about = "Nemato: light through inhomogeneous anisotropic media")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the input illumination of a job and save it as a `.dtmf` file.
    Illuminate {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Output file (overrides the [output] section).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Build the permittivity tensor field of a job and save it as `.npy`.
    Tensor {
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Summarise a `.dtmf` field data file.
    Inspect {
        file: PathBuf,
        /// Print the summary as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Validate a configuration file without running anything.
    Validate { config: PathBuf },
    /// List the built-in materials.
    Materials,
}

fn output_path(job: &config::JobConfig, output: Option<PathBuf>) -> PathBuf {
    output.unwrap_or_else(|| Path::new(&job.output.directory).join(&job.output.name))
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Illuminate { config, output } => {
            let job = config::load_config(&config)?;
            let engine = job.engine_config()?;
            let data = runner::run_illumination(&job, &engine)?;
            let path = output_path(&job, output);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let written = save_field_data(&path, &data, &engine)?;
            println!("Field data written to: {}", written.display());
            Ok(())
        }
        Commands::Tensor { config, output } => {
            let job = config::load_config(&config)?;
            let engine = job.engine_config()?;
            let tensor = runner::run_tensor(&job, &engine)?;
            let written = runner::write_tensor(&output_path(&job, output), &tensor, engine.precision)?;
            println!("Tensor field written to: {}", written.display());
            Ok(())
        }
        Commands::Inspect { file, json } => {
            let data = load_field(&file)?;
            let summary = runner::summarise(&data)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("File:        {}", file.display());
                println!("Shape:       {:?}", summary.shape);
                println!("Pixel size:  {} nm", summary.pixelsize);
                println!("Wavelength   Mean flux");
                for (w, flux) in summary.wavelengths.iter().zip(&summary.mean_flux) {
                    println!("{w:>10.2}   {flux:.6e}");
                }
            }
            Ok(())
        }
        Commands::Validate { config } => {
            let job = config::load_config(&config)?;
            job.engine_config()?;
            runner::illumination_params(&job.illumination)?;
            runner::wavelengths(&job.illumination.wavelengths)?;
            if let Some(director) = &job.director {
                let [nz, ny, nx] = director.shape;
                director.spec.build((nz, ny, nx))?;
            }
            job.material.spec.build()?;
            println!("Configuration is valid: {}", config.display());
            Ok(())
        }
        Commands::Materials => {
            println!("Available materials:");
            println!();
            println!("  5cb          5CB nematic, Cauchy dispersion (Li & Wu 2004)");
            println!("  sio2         Fused silica, Palik, 300–1000 nm");
            println!();
            println!("Custom materials: type = \"constant\", \"cauchy\" or \"table\".");
            Ok(())
        }
    }
}
