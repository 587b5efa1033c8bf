//! Names and fixed layout constants.

/// Application name, used for the descriptor suffix and container images.
pub const APP_NAME: &str = "mupy";

/// Extension of ensemble descriptor files scanned from the stock.
pub const DESCRIPTOR_EXTENSION: &str = "mupy";

/// Configuration file searched for in and above the working directory.
pub const CONFIG_FILENAME: &str = "mupy.yaml";

/// Environment variable overriding the CLI working directory.
pub const DIRECTORY_ENV: &str = "MUPY_DIRECTORY";

/// Extension of kit files handed to the target compiler.
pub const SOURCE_EXTENSION: &str = "py";

/// Base name the BOM root is materialized under.
pub const MAIN_NAME: &str = "main";

/// Mount point of the install tree on devices and in run containers.
pub const FLASH_DIR: &str = "/flash";
