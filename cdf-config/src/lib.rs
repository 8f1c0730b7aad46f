use std::path::PathBuf;

use envconfig::Envconfig;
use lazy_static::lazy_static;

#[derive(Debug, Envconfig)]
pub struct Config {
    #[envconfig(from = "CDF_LOG_LEVEL", default = "info")]
    pub log_level: String,
    /// Local cache directory used when loading partitions from object storage
    #[envconfig(from = "CDF_TMP_DIR", default = "./data/tmp")]
    pub tmp_dir: String,
    /// Rows in partition 0 when a persist call does not say otherwise
    #[envconfig(from = "CDF_FIRST_PART_SIZE")]
    pub first_part_size: Option<usize>,
    /// Rows in every following partition when a persist call does not say otherwise
    #[envconfig(from = "CDF_PART_SIZE")]
    pub part_size: Option<usize>,
    #[envconfig(from = "CDF_KV_BATCH_SIZE", default = "100000")]
    pub kv_batch_size: usize,
    #[envconfig(from = "CDF_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,
    #[envconfig(from = "CDF_S3_REGION")]
    pub s3_region: Option<String>,
    #[envconfig(from = "CDF_S3_ALLOW_HTTP", default = "false")]
    pub s3_allow_http: bool,
}

impl Config {
    pub fn init() -> Config {
        Config::init_from_env().expect("Failed to load config")
    }
}

lazy_static! {
    pub static ref CONFIG: Config = Config::init();
    /// The path to the cache directory for fetched partitions
    pub static ref TMP_DIR_PATH: PathBuf = PathBuf::from(&CONFIG.tmp_dir);
}
