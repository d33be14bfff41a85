use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Process settings, read once at startup from `YOLO_DASH_*` variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub weights_dir: PathBuf,
    pub assets_dir: PathBuf,
    pub static_dir: PathBuf,
    pub camera_index: u32,
    pub max_upload_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8090)),
            weights_dir: PathBuf::from("weights"),
            assets_dir: PathBuf::from("."),
            static_dir: PathBuf::from("static"),
            camera_index: 0,
            max_upload_bytes: 512 * 1024 * 1024,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(v) = get("YOLO_DASH_ADDR") {
            cfg.bind = v.parse().with_context(|| format!("YOLO_DASH_ADDR is not an address: {v}"))?;
        }
        if let Some(v) = get("YOLO_DASH_WEIGHTS") {
            cfg.weights_dir = v.into();
        }
        if let Some(v) = get("YOLO_DASH_ASSETS") {
            cfg.assets_dir = v.into();
        }
        if let Some(v) = get("YOLO_DASH_STATIC") {
            cfg.static_dir = v.into();
        }
        if let Some(v) = get("YOLO_DASH_CAMERA") {
            cfg.camera_index = v.parse().with_context(|| format!("YOLO_DASH_CAMERA is not a device index: {v}"))?;
        }
        if let Some(v) = get("YOLO_DASH_MAX_UPLOAD_MB") {
            let mb: usize = v.parse().with_context(|| format!("YOLO_DASH_MAX_UPLOAD_MB is not a number: {v}"))?;
            cfg.max_upload_bytes = mb * 1024 * 1024;
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let cfg = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.bind.port(), 8090);
        assert_eq!(cfg.weights_dir, PathBuf::from("weights"));
        assert_eq!(cfg.camera_index, 0);
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("YOLO_DASH_ADDR", "127.0.0.1:9000"),
            ("YOLO_DASH_WEIGHTS", "/opt/models"),
            ("YOLO_DASH_CAMERA", "2"),
            ("YOLO_DASH_MAX_UPLOAD_MB", "16"),
        ]))
        .unwrap();
        assert_eq!(cfg.bind, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(cfg.weights_dir, PathBuf::from("/opt/models"));
        assert_eq!(cfg.camera_index, 2);
        assert_eq!(cfg.max_upload_bytes, 16 * 1024 * 1024);
    }

    #[test]
    fn malformed_values_are_reported() {
        let err = AppConfig::from_lookup(lookup(&[("YOLO_DASH_CAMERA", "front")])).unwrap_err();
        assert!(err.to_string().contains("YOLO_DASH_CAMERA"));
    }
}
