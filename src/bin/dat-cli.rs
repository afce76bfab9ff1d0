//! dat-cli - Command-line interface for datcodec
//!
//! A command-line tool for decrypting zone sections and decoding textures
//! extracted from DAT asset containers.

use clap::{Args, Parser, Subcommand, ValueEnum};
use datcodec::{
    decode_texture, ByteCursor, DecryptStats, KeyTables, SectionHeader, TextureFormat,
    ZoneMeshDecryptor, ZoneObjectDecryptor, ZONE_MESH_SWAP_MARKER, ZONE_MESH_XOR_MIN_MODE,
    ZONE_OBJECT_PLAINTEXT_MAX_MODE,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Inputs above this size get a progress bar
const PROGRESS_THRESHOLD: usize = 1024 * 1024;

#[derive(Parser)]
#[command(name = "dat-cli")]
#[command(about = "A CLI tool for decrypting DAT zone sections and decoding textures")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Decrypt a zone object section in place and write the result
    Object {
        /// Input entry containing the section
        input: PathBuf,

        /// Output file for the decrypted entry
        output: PathBuf,

        #[command(flatten)]
        keys: KeyArgs,

        #[command(flatten)]
        section: SectionArgs,

        /// Force overwrite of output file
        #[arg(short, long)]
        force: bool,
    },

    /// Decrypt (or re-encrypt) a zone mesh section and write the result
    Mesh {
        /// Input entry containing the section
        input: PathBuf,

        /// Output file for the processed entry
        output: PathBuf,

        #[command(flatten)]
        keys: KeyArgs,

        #[command(flatten)]
        section: SectionArgs,

        /// Re-encrypt a plaintext section instead of decrypting it
        #[arg(long)]
        reencrypt: bool,

        /// Force overwrite of output file
        #[arg(short, long)]
        force: bool,
    },

    /// Decode texture pixels to raw RGBA8
    Texture {
        /// Input file holding the pixel payload
        input: PathBuf,

        /// Output file for the RGBA8 pixels
        output: PathBuf,

        /// Pixel format of the payload
        #[arg(long, value_enum)]
        format: CliTextureFormat,

        /// Width in pixels
        #[arg(long)]
        width: u32,

        /// Height in pixels
        #[arg(long)]
        height: u32,

        /// Offset of the payload within the input file
        #[arg(long, value_parser = parse_offset, default_value = "0")]
        offset: usize,

        /// Force overwrite of output file
        #[arg(short, long)]
        force: bool,
    },

    /// Show the metadata words of a section
    Info {
        /// Input entry containing the section
        input: PathBuf,

        /// Offset of the section header within the entry
        #[arg(long, value_parser = parse_offset, default_value = "0")]
        base_offset: usize,
    },
}

/// Where to find the two key tables
#[derive(Args)]
struct KeyArgs {
    /// File holding the key tables (a program image or a table dump)
    #[arg(short, long)]
    keys: PathBuf,

    /// Offset of the primary table within the key file
    #[arg(long, value_parser = parse_offset, default_value = "0")]
    primary_offset: usize,

    /// Offset of the secondary table within the key file
    #[arg(long, value_parser = parse_offset, default_value = "0x100")]
    secondary_offset: usize,
}

/// Where the section lives inside the entry
#[derive(Args)]
struct SectionArgs {
    /// Offset of the section header within the entry
    #[arg(long, value_parser = parse_offset, default_value = "0")]
    base_offset: usize,

    /// Offset of the following section (defaults to the end of the entry)
    #[arg(long, value_parser = parse_offset)]
    next_section_offset: Option<usize>,

    /// Section identifier, used in diagnostics
    #[arg(long, value_parser = parse_section_id, default_value = "0")]
    section_id: u32,
}

impl SectionArgs {
    fn header(&self, entry_len: usize) -> SectionHeader {
        SectionHeader::new(
            self.section_id,
            0,
            self.base_offset,
            self.next_section_offset.unwrap_or(entry_len),
        )
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum CliTextureFormat {
    /// DXT1 / BC1 block compression
    Dxt1,
    /// DXT3 / BC2 block compression with explicit alpha
    Dxt3,
    /// 32-bit BGRA, bottom row first
    Bgra32,
    /// 256-color BGRA palette plus 8-bit indices
    Indexed8,
}

impl From<CliTextureFormat> for TextureFormat {
    fn from(format: CliTextureFormat) -> Self {
        match format {
            CliTextureFormat::Dxt1 => TextureFormat::Dxt1,
            CliTextureFormat::Dxt3 => TextureFormat::Dxt3,
            CliTextureFormat::Bgra32 => TextureFormat::Bgra32,
            CliTextureFormat::Indexed8 => TextureFormat::Indexed8,
        }
    }
}

#[derive(Copy, Clone)]
enum SectionKind {
    Object,
    Mesh { reencrypt: bool },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Object {
            input,
            output,
            keys,
            section,
            force,
        } => process_section(
            &input,
            &output,
            &keys,
            &section,
            SectionKind::Object,
            force,
            cli.verbose,
            cli.quiet,
        ),
        Commands::Mesh {
            input,
            output,
            keys,
            section,
            reencrypt,
            force,
        } => process_section(
            &input,
            &output,
            &keys,
            &section,
            SectionKind::Mesh { reencrypt },
            force,
            cli.verbose,
            cli.quiet,
        ),
        Commands::Texture {
            input,
            output,
            format,
            width,
            height,
            offset,
            force,
        } => decode_texture_file(
            &input,
            &output,
            format.into(),
            width,
            height,
            offset,
            force,
            cli.verbose,
            cli.quiet,
        ),
        Commands::Info { input, base_offset } => show_section_info(&input, base_offset),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Parse a decimal or `0x`-prefixed hexadecimal offset
fn parse_offset(value: &str) -> Result<usize, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|e| format!("invalid offset '{}': {}", value, e))
}

/// Parse a section identifier; values that do not fit in 32 bits are rejected
fn parse_section_id(value: &str) -> Result<u32, String> {
    let id = parse_offset(value)?;
    u32::try_from(id).map_err(|_| format!("section id '{}' does not fit in 32 bits", value))
}

fn check_paths(
    input: &Path,
    output: &Path,
    force: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    // Check if input file exists
    if !input.exists() {
        return Err(format!("Input file '{}' does not exist", input.display()).into());
    }

    // Check if output file exists and force flag
    if output.exists() && !force {
        return Err(format!(
            "Output file '{}' already exists. Use --force to overwrite",
            output.display()
        )
        .into());
    }

    Ok(())
}

fn progress_bar(
    size: usize,
    quiet: bool,
    message: &'static str,
) -> Result<Option<ProgressBar>, Box<dyn std::error::Error>> {
    if quiet || size <= PROGRESS_THRESHOLD {
        return Ok(None);
    }

    let pb = ProgressBar::new(2);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}",
            )?
            .progress_chars("#>-"),
    );
    pb.set_message(message);
    pb.inc(1);
    Ok(Some(pb))
}

fn load_key_tables(keys: &KeyArgs) -> Result<KeyTables, Box<dyn std::error::Error>> {
    let image = fs::read(&keys.keys)
        .map_err(|e| format!("Failed to read key file '{}': {}", keys.keys.display(), e))?;
    let tables = KeyTables::from_image(&image, keys.primary_offset, keys.secondary_offset)
        .map_err(|e| format!("Failed to load key tables: {}", e))?;
    Ok(tables)
}

#[allow(clippy::too_many_arguments)]
fn process_section(
    input: &Path,
    output: &Path,
    keys: &KeyArgs,
    section: &SectionArgs,
    kind: SectionKind,
    force: bool,
    verbose: bool,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    check_paths(input, output, force)?;

    let tables = load_key_tables(keys)?;
    let mut entry = fs::read(input)?;
    let header = section.header(entry.len());

    if verbose {
        println!(
            "Processing section at {:#x}..{:#x} of '{}'",
            header.base_offset,
            header.next_section_offset,
            input.display()
        );
    }

    let start_time = Instant::now();
    let progress = progress_bar(entry.len(), quiet, "Decrypting...")?;

    let mut cursor = ByteCursor::new(&mut entry[..]);
    let stats = match kind {
        SectionKind::Object => ZoneObjectDecryptor::new(&tables).decrypt(&mut cursor, &header),
        SectionKind::Mesh { reencrypt } => {
            ZoneMeshDecryptor::new(&tables).process(&mut cursor, &header, reencrypt)
        }
    }
    .map_err(|e| format!("Section decryption failed: {}", e))?;

    if let Some(ref pb) = progress {
        pb.inc(1);
        pb.finish_with_message("Decryption complete");
    }

    fs::write(output, &entry)?;

    if !quiet {
        print_stats(&stats, kind, verbose);
        println!("  Time:   {:.2?}", start_time.elapsed());
    }

    Ok(())
}

fn print_stats(stats: &DecryptStats, kind: SectionKind, verbose: bool) {
    println!("✓ Section processed!");
    println!("  Mode:   {:#04x}", stats.mode);
    println!("  Length: {} bytes", stats.decode_length);

    match kind {
        SectionKind::Object => {
            println!("  Inverted runs:  {}", stats.inverted_runs);
            println!("  Unmasked nodes: {}", stats.unmasked_nodes);
        }
        SectionKind::Mesh { .. } => {
            println!("  XOR stream: {}", if stats.xor_pass { "yes" } else { "no" });
            println!(
                "  Block swap: {} ({} blocks)",
                if stats.swap_pass { "yes" } else { "no" },
                stats.swapped_blocks
            );
        }
    }

    if stats.clamped_bytes > 0 {
        println!(
            "  Warning: declared length overran the next section, clamped by {} bytes",
            stats.clamped_bytes
        );
    } else if verbose {
        println!("  Declared length fits the section");
    }
}

#[allow(clippy::too_many_arguments)]
fn decode_texture_file(
    input: &Path,
    output: &Path,
    format: TextureFormat,
    width: u32,
    height: u32,
    offset: usize,
    force: bool,
    verbose: bool,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    check_paths(input, output, force)?;

    let data = fs::read(input)?;
    let payload = data.get(offset..).ok_or_else(|| {
        format!(
            "Offset {:#x} is past the end of '{}'",
            offset,
            input.display()
        )
    })?;

    if verbose {
        println!(
            "Decoding {} {}x{} texture from '{}' ({} of {} bytes used)",
            format,
            width,
            height,
            input.display(),
            format.encoded_len(width, height),
            payload.len()
        );
    }

    let start_time = Instant::now();
    let progress = progress_bar(payload.len(), quiet, "Decoding...")?;

    let texture = decode_texture(format, payload, width, height)
        .map_err(|e| format!("Texture decoding failed: {}", e))?;

    if let Some(ref pb) = progress {
        pb.inc(1);
        pb.finish_with_message("Decoding complete");
    }

    fs::write(output, texture.as_bytes())?;

    if !quiet {
        println!("✓ Texture decoded!");
        println!("  Format: {}", format);
        println!("  Size:   {}x{}", texture.width, texture.height);
        println!("  Output: {} bytes", texture.rgba.len());
        println!("  Time:   {:.2?}", start_time.elapsed());
    }

    Ok(())
}

fn show_section_info(
    input: &Path,
    base_offset: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    // Check if input file exists
    if !input.exists() {
        return Err(format!("Input file '{}' does not exist", input.display()).into());
    }

    let data = fs::read(input)?;
    let header = SectionHeader::new(0, 0, base_offset, data.len());
    let mut cursor = ByteCursor::new(&data[..]);
    cursor.seek_payload(&header)?;
    let meta = cursor.next_u32()?;
    let second = cursor.next_u32()?;

    let mode = (meta >> 24) as u8;
    let length = meta & 0x00FF_FFFF;
    let upper = (second >> 24) as u8;
    let key_index = ((second >> 8) & 0xFF) as u8;
    let marker = (second >> 16) as u16;

    println!("Section Information:");
    println!("  File: {}", input.display());
    println!("  Entry Size: {} bytes", data.len());
    println!("  Base Offset: {:#x}", base_offset);
    println!("  Mode: {:#04x}", mode);
    println!("  Length Field: {:#x} ({} bytes)", length, length);
    println!("  As zone object:");
    println!(
        "    Node Count: {}, Key Index: {:#04x}, {}",
        second & 0x00FF_FFFF,
        upper,
        if mode > ZONE_OBJECT_PLAINTEXT_MAX_MODE { "encrypted" } else { "plaintext" }
    );
    println!("  As zone mesh:");
    println!(
        "    Key Index: {:#04x}, XOR stream: {}, Block swap: {}",
        key_index,
        if mode >= ZONE_MESH_XOR_MIN_MODE { "yes" } else { "no" },
        if marker == ZONE_MESH_SWAP_MARKER { "yes" } else { "no" }
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use datcodec::KEY_TABLE_SIZE;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_parse_offset() {
        assert_eq!(parse_offset("16"), Ok(16));
        assert_eq!(parse_offset("0x10"), Ok(16));
        assert_eq!(parse_offset("0X1f"), Ok(31));
        assert!(parse_offset("0xZZ").is_err());
    }

    #[test]
    fn test_parse_section_id() {
        assert_eq!(parse_section_id("0x5F4D5A4D"), Ok(0x5F4D_5A4D));
        assert_eq!(parse_section_id("4294967295"), Ok(u32::MAX));
        assert!(parse_section_id("0x100000000").is_err());
        assert!(parse_section_id("nope").is_err());
    }

    #[test]
    fn test_mesh_round_trip() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let keys_path = dir.path().join("keys.bin");
        let plain_path = dir.path().join("plain.dat");
        let encrypted_path = dir.path().join("encrypted.dat");
        let output_path = dir.path().join("output.dat");

        // Primary table followed by secondary table
        let keys: Vec<u8> = (0..2 * KEY_TABLE_SIZE).map(|i| (i * 13) as u8).collect();
        fs::write(&keys_path, &keys)?;

        let mut entry = vec![0u8; 0x98];
        entry[0x10..0x14].copy_from_slice(&0x0700_0088u32.to_le_bytes());
        entry[0x15] = 0x5A;
        entry[0x16..0x18].copy_from_slice(&0xFFFFu16.to_le_bytes());
        for (i, b) in entry[0x18..].iter_mut().enumerate() {
            *b = (i * 3) as u8;
        }
        fs::write(&plain_path, &entry)?;

        let key_args = KeyArgs {
            keys: keys_path,
            primary_offset: 0,
            secondary_offset: KEY_TABLE_SIZE,
        };
        let section = SectionArgs {
            base_offset: 0,
            next_section_offset: None,
            section_id: 0,
        };

        process_section(
            &plain_path,
            &encrypted_path,
            &key_args,
            &section,
            SectionKind::Mesh { reencrypt: true },
            false,
            false,
            true,
        )?;
        assert_ne!(fs::read(&encrypted_path)?, entry);

        process_section(
            &encrypted_path,
            &output_path,
            &key_args,
            &section,
            SectionKind::Mesh { reencrypt: false },
            false,
            false,
            true,
        )?;
        assert_eq!(fs::read(&output_path)?, entry);

        // Refuses to overwrite without --force
        assert!(process_section(
            &encrypted_path,
            &output_path,
            &key_args,
            &section,
            SectionKind::Mesh { reencrypt: false },
            false,
            false,
            true,
        )
        .is_err());

        Ok(())
    }

    #[test]
    fn test_texture_output() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let input_path = dir.path().join("texture.bin");
        let output_path = dir.path().join("texture.rgba");

        let mut data = vec![0xEE; 4];
        data.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        fs::write(&input_path, &data)?;

        decode_texture_file(
            &input_path,
            &output_path,
            TextureFormat::Bgra32,
            1,
            2,
            4,
            false,
            false,
            true,
        )?;
        assert_eq!(fs::read(&output_path)?, vec![7, 6, 5, 8, 3, 2, 1, 4]);

        Ok(())
    }
}
