use crate::file_util::{self, DEFAULT_HOMEDIR};
use easyyolo_domain::{to_yolo, yoloerr, YoloResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub type Rgba = [u8; 4];

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct Colors {
    pub active: Rgba,
    pub saved: Rgba,
    pub hover: Rgba,
    pub text: Rgba,
    pub background: Rgba,
}
impl Default for Colors {
    fn default() -> Self {
        Self {
            active: [255, 0, 0, 255],
            saved: [0, 255, 0, 255],
            hover: [255, 255, 0, 255],
            text: [255, 255, 255, 255],
            background: [0, 0, 0, 179],
        }
    }
}

/// Everything about the editor that is not part of the annotation data. Missing entries in a
/// config file fall back to the values of [`EditorCfg::default`].
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EditorCfg {
    /// Longer image side on the canvas, larger images are scaled down.
    pub max_display_size: u32,
    /// Drawn boxes narrower or lower than this in display pixels are discarded.
    pub min_box_px: f64,
    /// Side of the square around each corner of the selected box that starts a resize.
    pub handle_hit_px: f64,
    pub handle_draw_px: f64,
    /// Resizing never shrinks a box below this extent in display pixels.
    pub min_resize_px: f64,
    pub outline_thickness: f64,
    pub font_size: f64,
    pub storage_key: String,
    pub default_label: String,
    pub placeholder_label: String,
    pub enable_touch: bool,
    pub enable_auto_label: bool,
    pub auto_label_threshold: f64,
    pub font_path: Option<PathBuf>,
    pub colors: Colors,
}
impl Default for EditorCfg {
    fn default() -> Self {
        Self {
            max_display_size: 800,
            min_box_px: 10.0,
            handle_hit_px: 8.0,
            handle_draw_px: 6.0,
            min_resize_px: 1.0,
            outline_thickness: 2.0,
            font_size: 14.0,
            storage_key: "easyYoloAnnotations".into(),
            default_label: "object".into(),
            placeholder_label: "new annotation".into(),
            enable_touch: true,
            enable_auto_label: false,
            auto_label_threshold: 0.7,
            font_path: None,
            colors: Colors::default(),
        }
    }
}

impl EditorCfg {
    /// Rejects sizes and thresholds the editor cannot work with.
    pub fn validate(&self) -> YoloResult<()> {
        if self.max_display_size == 0 {
            return Err(yoloerr!("max_display_size must be positive"));
        }
        let sizes = [
            ("min_box_px", self.min_box_px),
            ("handle_hit_px", self.handle_hit_px),
            ("handle_draw_px", self.handle_draw_px),
            ("min_resize_px", self.min_resize_px),
            ("outline_thickness", self.outline_thickness),
            ("font_size", self.font_size),
        ];
        if let Some((name, value)) = sizes.iter().find(|(_, v)| !(v.is_finite() && *v > 0.0)) {
            return Err(yoloerr!("{name} must be a positive number, got {value}"));
        }
        if !(0.0..=1.0).contains(&self.auto_label_threshold) {
            return Err(yoloerr!(
                "auto_label_threshold must be in [0, 1], got {}",
                self.auto_label_threshold
            ));
        }
        Ok(())
    }
}

pub fn get_cfg_path(home: &Path) -> PathBuf {
    home.join("cfg.toml")
}

pub fn get_log_folder(home: &Path) -> PathBuf {
    home.join("logs")
}

pub fn read_cfg_from_path(cfg_toml_path: &Path) -> YoloResult<EditorCfg> {
    if cfg_toml_path.exists() {
        let toml_str = file_util::read_to_string(cfg_toml_path)?;
        let cfg: EditorCfg = toml::from_str(&toml_str)
            .map_err(|e| yoloerr!("could not parse cfg due to {:?}", e))?;
        cfg.validate()
            .map_err(|e| yoloerr!("invalid cfg {cfg_toml_path:?}, {}", e.msg()))?;
        Ok(cfg)
    } else {
        warn!("cfg file {cfg_toml_path:?} does not exist. using default cfg");
        Ok(EditorCfg::default())
    }
}

pub fn read_cfg() -> YoloResult<EditorCfg> {
    read_cfg_from_path(&get_cfg_path(&DEFAULT_HOMEDIR))
}

pub fn write_cfg_to_path(cfg: &EditorCfg, p: &Path) -> YoloResult<()> {
    let cfg_str = toml::to_string_pretty(cfg).map_err(to_yolo)?;
    file_util::write(p, cfg_str)?;
    info!("wrote cfg to {p:?}");
    Ok(())
}

pub fn write_cfg(cfg: &EditorCfg) -> YoloResult<()> {
    write_cfg_to_path(cfg, &get_cfg_path(&DEFAULT_HOMEDIR))
}

#[cfg(test)]
use crate::{defer_folder_removal, file_util::DEFAULT_TMPDIR};

#[test]
fn test_default_cfg() {
    let cfg = EditorCfg::default();
    assert_eq!(cfg.max_display_size, 800);
    assert_eq!(cfg.min_box_px, 10.0);
    assert_eq!(cfg.handle_hit_px, 8.0);
    assert_eq!(cfg.storage_key, "easyYoloAnnotations");
    assert_eq!(cfg.colors, Colors::default());
    assert!(cfg.font_path.is_none());
    assert!(!cfg.enable_auto_label);
}

#[test]
fn test_partial_cfg() {
    let cfg: EditorCfg = toml::from_str("max_display_size = 1024\n[colors]\nactive = [1, 2, 3, 4]\n").unwrap();
    assert_eq!(cfg.max_display_size, 1024);
    assert_eq!(cfg.colors.active, [1, 2, 3, 4]);
    assert_eq!(cfg.colors.saved, Colors::default().saved);
    assert_eq!(cfg.min_box_px, 10.0);
}

#[test]
fn test_write_read_cfg() {
    let folder = DEFAULT_TMPDIR.join("cfg_test_write_read");
    defer_folder_removal!(&folder);
    let path = get_cfg_path(&folder);
    let missing = read_cfg_from_path(&path).unwrap();
    assert_eq!(missing, EditorCfg::default());
    let cfg = EditorCfg {
        font_size: 20.0,
        enable_touch: false,
        ..EditorCfg::default()
    };
    write_cfg_to_path(&cfg, &path).unwrap();
    assert_eq!(read_cfg_from_path(&path).unwrap(), cfg);
    file_util::write(&path, "max_display_size = \"big\"").unwrap();
    assert!(read_cfg_from_path(&path).is_err());
}

#[test]
fn test_validate_cfg() {
    assert!(EditorCfg::default().validate().is_ok());
    let folder = DEFAULT_TMPDIR.join("cfg_test_validate");
    defer_folder_removal!(&folder);
    let path = get_cfg_path(&folder);
    file_util::write(&path, "max_display_size = 0").unwrap();
    assert!(read_cfg_from_path(&path).is_err());
    for invalid in [
        "min_box_px = -1.0",
        "outline_thickness = 0.0",
        "font_size = nan",
        "auto_label_threshold = 1.5",
    ] {
        file_util::write(&path, invalid).unwrap();
        assert!(read_cfg_from_path(&path).is_err(), "{invalid}");
    }
    file_util::write(&path, "max_display_size = 1\nauto_label_threshold = 0.0").unwrap();
    assert_eq!(read_cfg_from_path(&path).unwrap().max_display_size, 1);
}
