use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::ValueEnum;
use directories::{BaseDirs, ProjectDirs};
use serde::Deserialize;
use thiserror::Error;

use crate::cli::{CliArgs, CliSources, CodecPolicy, OcrEngineChoice};
use vidextract_timestamp::TimestampFormat;
use vidextract_types::{Corner, Region, RegionRect};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    backend: Option<String>,
    region: Option<String>,
    format: Option<String>,
    ocr_engine: Option<String>,
    tesseract_cmd: Option<String>,
    confidence_floor: Option<f32>,
    tolerance_frames: Option<u64>,
    codec: Option<String>,
    batch_pad_secs: Option<f64>,
    batch_output_name: Option<String>,
}

/// CLI values merged over the config file, ready for the session builder.
#[derive(Debug)]
pub struct EffectiveSettings {
    pub backend: Option<String>,
    pub region: Region,
    pub ocr_engine: OcrEngineChoice,
    pub tesseract_cmd: Option<PathBuf>,
    pub confidence_floor: f32,
    pub tolerance_frames: u64,
    pub codec: CodecPolicy,
    pub batch_pad_secs: f64,
    pub batch_output_name: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid value '{value}' for '{field}'")]
    InvalidValue { field: &'static str, value: String },

    #[error("config file {path} does not exist")]
    NotFound { path: PathBuf },
}

pub fn resolve_settings(
    cli: &CliArgs,
    sources: &CliSources,
) -> Result<EffectiveSettings, ConfigError> {
    let file = load_config(cli.config.as_deref())?;
    merge(cli, sources, file)
}

fn load_config(path_override: Option<&Path>) -> Result<FileConfig, ConfigError> {
    if let Some(path) = path_override {
        let path = path.to_path_buf();
        if !path.exists() {
            return Err(ConfigError::NotFound { path });
        }
        return read_config(&path);
    }

    if let Some(project_path) = project_config_path() {
        if project_path.exists() {
            return read_config(&project_path);
        }
    }

    match default_config_path() {
        Some(path) if path.exists() => read_config(&path),
        _ => Ok(FileConfig::default()),
    }
}

fn read_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn merge(
    cli: &CliArgs,
    sources: &CliSources,
    file: FileConfig,
) -> Result<EffectiveSettings, ConfigError> {
    let mut backend = normalize_string(cli.backend.clone());
    if backend.is_none() {
        backend = normalize_string(file.backend);
    }

    let rect = match normalize_string(cli.region.clone()).or_else(|| normalize_string(file.region))
    {
        Some(spec) => parse_region(&spec)?,
        None => Region::default().rect,
    };
    let format_hint = match normalize_string(cli.format.clone())
        .or_else(|| normalize_string(file.format))
    {
        Some(name) => Some(parse_format(&name)?),
        None => None,
    };
    let mut region = Region::new(rect);
    region.format_hint = format_hint;

    let mut ocr_engine = cli.ocr_engine;
    if !sources.ocr_engine_from_cli {
        if let Some(value) = normalize_string(file.ocr_engine) {
            ocr_engine = OcrEngineChoice::from_str(&value, false).map_err(|_| {
                ConfigError::InvalidValue {
                    field: "ocr_engine",
                    value,
                }
            })?;
        }
    }

    let mut tesseract_cmd = cli.tesseract_cmd.clone();
    if tesseract_cmd.is_none() {
        tesseract_cmd = normalize_string(file.tesseract_cmd).map(|value| expand_home_path(&value));
    }

    let mut confidence_floor = cli.confidence_floor;
    if !sources.confidence_floor_from_cli {
        if let Some(value) = file.confidence_floor {
            confidence_floor = value;
        }
    }
    if !(0.0..=1.0).contains(&confidence_floor) {
        return Err(ConfigError::InvalidValue {
            field: "confidence_floor",
            value: confidence_floor.to_string(),
        });
    }

    let mut tolerance_frames = cli.tolerance_frames;
    if !sources.tolerance_frames_from_cli {
        if let Some(value) = file.tolerance_frames {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "tolerance_frames",
                    value: value.to_string(),
                });
            }
            tolerance_frames = value;
        }
    }

    let mut codec = cli.codec;
    if !sources.codec_from_cli {
        if let Some(value) = normalize_string(file.codec) {
            codec = CodecPolicy::from_str(&value, false).map_err(|_| {
                ConfigError::InvalidValue {
                    field: "codec",
                    value,
                }
            })?;
        }
    }

    let mut batch_pad_secs = cli.batch_pad_secs;
    if !sources.batch_pad_secs_from_cli {
        if let Some(value) = file.batch_pad_secs {
            batch_pad_secs = value;
        }
    }
    if !batch_pad_secs.is_finite() || batch_pad_secs < 0.0 {
        return Err(ConfigError::InvalidValue {
            field: "batch_pad_secs",
            value: batch_pad_secs.to_string(),
        });
    }

    let mut batch_output_name = cli.batch_output_name.clone();
    if !sources.batch_output_name_from_cli {
        if let Some(value) = normalize_string(file.batch_output_name) {
            batch_output_name = value;
        }
    }

    Ok(EffectiveSettings {
        backend,
        region,
        ocr_engine,
        tesseract_cmd,
        confidence_floor,
        tolerance_frames,
        codec,
        batch_pad_secs,
        batch_output_name,
    })
}

/// `top-right:300x50`, `px:X,Y,W,H` or `frac:X,Y,W,H`.
pub fn parse_region(spec: &str) -> Result<RegionRect, ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        field: "region",
        value: spec.to_string(),
    };
    let (kind, rest) = spec.split_once(':').ok_or_else(invalid)?;
    match kind {
        "px" => {
            let [x, y, width, height] = parse_numbers::<u32, 4>(rest).ok_or_else(invalid)?;
            Ok(RegionRect::Pixels {
                x,
                y,
                width,
                height,
            })
        }
        "frac" => {
            let [x, y, width, height] = parse_numbers::<f32, 4>(rest).ok_or_else(invalid)?;
            Ok(RegionRect::Fractional {
                x,
                y,
                width,
                height,
            })
        }
        corner => {
            let corner = Corner::from_str(corner).map_err(|_| invalid())?;
            let (width, height) = rest.split_once('x').ok_or_else(invalid)?;
            Ok(RegionRect::Anchored {
                corner,
                width: width.trim().parse().map_err(|_| invalid())?,
                height: height.trim().parse().map_err(|_| invalid())?,
            })
        }
    }
}

fn parse_numbers<T: FromStr, const N: usize>(value: &str) -> Option<[T; N]> {
    let parts: Vec<T> = value
        .split(',')
        .map(|part| part.trim().parse().ok())
        .collect::<Option<Vec<T>>>()?;
    parts.try_into().ok()
}

fn parse_format(name: &str) -> Result<TimestampFormat, ConfigError> {
    TimestampFormat::from_str(name).map_err(|_| ConfigError::InvalidValue {
        field: "format",
        value: name.to_string(),
    })
}

fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("rs", "vidextract", "vidextract")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

fn project_config_path() -> Option<PathBuf> {
    env::current_dir().ok().map(|dir| dir.join("config.toml"))
}

fn normalize_string(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn expand_home_path(value: &str) -> PathBuf {
    if value == "~" {
        if let Some(base) = BaseDirs::new() {
            return base.home_dir().to_path_buf();
        }
    } else if let Some(stripped) = value.strip_prefix("~/") {
        if let Some(base) = BaseDirs::new() {
            return base.home_dir().join(stripped);
        }
    }
    PathBuf::from(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    fn args(argv: &[&str]) -> CliArgs {
        let mut full = vec!["vidextract"];
        full.extend_from_slice(argv);
        CliArgs::try_parse_from(full).unwrap()
    }

    #[test]
    fn region_specs_parse() {
        assert_eq!(
            parse_region("top-right:300x50").unwrap(),
            RegionRect::Anchored {
                corner: Corner::TopRight,
                width: 300,
                height: 50,
            }
        );
        assert_eq!(
            parse_region("px:10,20,30,40").unwrap(),
            RegionRect::Pixels {
                x: 10,
                y: 20,
                width: 30,
                height: 40,
            }
        );
        assert_eq!(
            parse_region("frac:0.5,0.0,0.5,0.2").unwrap(),
            RegionRect::Fractional {
                x: 0.5,
                y: 0.0,
                width: 0.5,
                height: 0.2,
            }
        );
        assert!(parse_region("middle:1x1").is_err());
        assert!(parse_region("px:1,2,3").is_err());
    }

    #[test]
    fn file_values_fill_in_cli_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "ocr_engine = \"mock\"\nconfidence_floor = 0.8\ntolerance_frames = 2\nregion = \"px:0,0,100,40\""
        )
        .unwrap();

        let cli = args(&["--config", file.path().to_str().unwrap(), "video.mp4"]);
        let settings = resolve_settings(&cli, &CliSources::default()).unwrap();
        assert_eq!(settings.ocr_engine, OcrEngineChoice::Mock);
        assert_eq!(settings.confidence_floor, 0.8);
        assert_eq!(settings.tolerance_frames, 2);
        assert_eq!(
            settings.region.rect,
            RegionRect::Pixels {
                x: 0,
                y: 0,
                width: 100,
                height: 40,
            }
        );
    }

    #[test]
    fn cli_values_win_over_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "confidence_floor = 0.8").unwrap();

        let cli = args(&[
            "--config",
            file.path().to_str().unwrap(),
            "--confidence-floor",
            "0.4",
            "video.mp4",
        ]);
        let sources = CliSources {
            confidence_floor_from_cli: true,
            ..CliSources::default()
        };
        let settings = resolve_settings(&cli, &sources).unwrap();
        assert_eq!(settings.confidence_floor, 0.4);
    }

    #[test]
    fn out_of_range_confidence_floor_is_rejected() {
        let cli = args(&["--confidence-floor", "1.5", "video.mp4"]);
        let sources = CliSources {
            confidence_floor_from_cli: true,
            ..CliSources::default()
        };
        let err = merge(&cli, &sources, FileConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "confidence_floor",
                ..
            }
        ));
    }

    #[test]
    fn format_hint_comes_from_either_source() {
        let cli = args(&["--format", "iso", "video.mp4"]);
        let settings = merge(&cli, &CliSources::default(), FileConfig::default()).unwrap();
        assert_eq!(settings.region.format_hint, Some(TimestampFormat::IsoDateTime));
    }
}
