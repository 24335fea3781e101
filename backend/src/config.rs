use std::env;

/// Upload types the predict endpoint accepts, matched against the final
/// filename extension after lowercasing.
pub const ALLOWED_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "tiff", "dcm"];

const DEFAULT_MAX_UPLOAD_MB: usize = 10;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub frontend_dir: String,
    pub model_path: String,
    pub max_upload_bytes: usize,
    pub rate_per_minute: u32,
    pub rate_per_day: u32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let frontend_dir = if let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") {
            format!("{}/../frontend", manifest_dir)
        } else {
            "./frontend".to_string()
        };

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_parsed("PORT", 5001),
            frontend_dir: env::var("FRONTEND_DIR").unwrap_or(frontend_dir),
            model_path: env::var("MODEL_PATH")
                .unwrap_or_else(|_| "./backend/brain_model.onnx".to_string()),
            max_upload_bytes: env_parsed("MAX_UPLOAD_MB", DEFAULT_MAX_UPLOAD_MB) * 1024 * 1024,
            rate_per_minute: env_parsed("RATE_LIMIT_PER_MINUTE", 50),
            rate_per_day: env_parsed("RATE_LIMIT_PER_DAY", 1000),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn max_upload_mb(&self) -> usize {
        self.max_upload_bytes / (1024 * 1024)
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

/// True iff the filename has an extension and it is in the allowed set.
pub fn is_allowed_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
