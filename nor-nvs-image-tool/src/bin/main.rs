use std::path::PathBuf;

use clap::{
    Parser,
    Subcommand,
};
use nor_nvs_image_tool::{
    NvsImage,
    ERASE_SIZE,
};

#[derive(Parser)]
#[command(name = "nor-nvs-image-tool")]
#[command(about = "nor-nvs flash image generator and parser", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a flash image from a CSV file
    Generate {
        /// Input CSV file path
        input: PathBuf,

        /// Output image file path
        output: PathBuf,

        /// Sector size in bytes (must be a multiple of 4096)
        #[arg(long, value_parser = parse_size, default_value_t = ERASE_SIZE)]
        sector_size: usize,

        /// Number of sectors, at least 2
        #[arg(long)]
        sector_count: u16,
    },
    /// Parse a flash image to a CSV file
    Parse {
        /// Input image file path
        input: PathBuf,

        /// Output CSV file path
        output: PathBuf,

        /// Sector size in bytes the image was generated with
        #[arg(long, value_parser = parse_size, default_value_t = ERASE_SIZE)]
        sector_size: usize,
    },
}

fn parse_size(s: &str) -> Result<usize, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        usize::from_str_radix(hex, 16).map_err(|e| e.to_string())
    } else {
        s.parse::<usize>().map_err(|e| e.to_string())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            input,
            output,
            sector_size,
            sector_count,
        } => {
            println!("Parsing CSV file: {}", input.display());
            let image = NvsImage::from_csv_file(&input)?;
            println!("Found {} entries", image.entries.len());

            println!("Generating image...");
            image.generate_image_file(&output, sector_size, sector_count)?;

            println!("Successfully generated NVS image: {}", output.display());
            println!(
                "Size: {} bytes ({} sectors)",
                sector_size * sector_count as usize,
                sector_count
            );

            Ok(())
        }
        Commands::Parse {
            input,
            output,
            sector_size,
        } => {
            println!("Parsing image file: {}", input.display());
            let image = NvsImage::parse_image_file(&input, sector_size)?;
            println!("Found {} entries", image.entries.len());

            println!("Writing CSV file...");
            image.to_csv_file(&output)?;

            println!("Successfully parsed NVS image to: {}", output.display());

            Ok(())
        }
    }
}
