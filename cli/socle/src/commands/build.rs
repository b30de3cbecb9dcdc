//! `socle build` — compose a SoC and emit its description.

use std::path::Path;

use anyhow::{Context, Result};
use socle_compose::{SocComposer, SocConfig, SocImage};
use tracing::{info, warn};

use crate::resolve;

/// Arguments for a single build.
pub struct BuildArgs<'a> {
    pub board: &'a str,
    pub variant: Option<&'a str>,
    pub config: Option<&'a Path>,
    pub firmware: Option<&'a Path>,
    pub toml: bool,
    pub image_out: Option<&'a Path>,
}

/// Compose the SoC described by `args`.
pub fn compose(args: &BuildArgs<'_>) -> Result<SocImage> {
    let board = resolve::board(args.board)?;
    let config = match args.config {
        Some(path) => SocConfig::load(path).with_context(|| format!("loading config {}", path.display()))?,
        None => SocConfig::default(),
    };

    let mut composer = SocComposer::new(board, config);
    if let Some(name) = args.variant {
        composer = composer.variant(resolve::variant(name)?);
    }
    if let Some(path) = args.firmware {
        let bytes = std::fs::read(path).with_context(|| format!("reading firmware {}", path.display()))?;
        composer = composer.firmware(bytes);
    }
    Ok(composer.build()?)
}

/// Build, print the SoC description to stdout, and optionally write the
/// placeholder image.
pub fn run(args: &BuildArgs<'_>) -> Result<()> {
    let image = compose(args)?;

    if args.toml {
        print!("{}", image.to_toml()?);
    } else {
        println!("{}", image.to_json()?);
    }

    if let Some(out) = args.image_out {
        match &image.placeholder {
            Some(placeholder) => {
                placeholder
                    .write_to(out, image.cpu_endianness)
                    .with_context(|| format!("writing image {}", out.display()))?;
                info!(path = %out.display(), bytes = placeholder.size, "wrote placeholder image");
            }
            None => warn!(path = %out.display(), "no placeholder image generated; image not written"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(board: &str) -> BuildArgs<'_> {
        BuildArgs {
            board,
            variant: None,
            config: None,
            firmware: None,
            toml: false,
            image_out: None,
        }
    }

    #[test]
    fn builtin_board_and_variant() {
        let image = compose(&BuildArgs {
            variant: Some("fomu-evt-usb"),
            ..args("fomu-evt")
        })
        .unwrap();
        assert_eq!(image.variant.as_deref(), Some("fomu-evt-usb"));
    }

    #[test]
    fn config_file_applies() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("soc.toml");
        std::fs::write(&config, "integrated-rom-size = 0x1000\nfirmware-size = 0x2400\n").unwrap();
        let err = compose(&BuildArgs {
            config: Some(config.as_path()),
            ..args("fomu-evt")
        })
        .unwrap_err();
        assert!(format!("{err:#}").contains("'rom'"));
    }

    #[test]
    fn firmware_file_replaces_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let firmware = dir.path().join("bios.bin");
        std::fs::write(&firmware, [0u8; 64]).unwrap();
        let image = compose(&BuildArgs {
            firmware: Some(firmware.as_path()),
            ..args("fomu-evt")
        })
        .unwrap();
        assert!(image.placeholder.is_none());
        assert_eq!(image.firmware.size, 64);
    }

    #[test]
    fn writes_placeholder_image() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("rom.bin");
        run(&BuildArgs {
            image_out: Some(out.as_path()),
            ..args("fomu-evt")
        })
        .unwrap();
        assert_eq!(std::fs::metadata(&out).unwrap().len(), 0x2c00);
    }

    #[test]
    fn flash_boot_skips_image_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("rom.bin");
        run(&BuildArgs {
            image_out: Some(out.as_path()),
            ..args("tinyfpga-bx")
        })
        .unwrap();
        assert!(!out.exists());
    }
}
