//! # Tool Path Resolver
//!
//! Locates the external WebP encoder:
//! - Directory named by `IMAGE_NORMALIZER_TOOLS_DIR`
//! - System-installed tools on `PATH`

use std::env;
use std::path::PathBuf;
use tracing::debug;

/// Environment variable pointing at a directory with bundled tools
pub const TOOLS_DIR_ENV: &str = "IMAGE_NORMALIZER_TOOLS_DIR";

/// Resolves external tools from an optional tools directory and `PATH`
pub struct ToolPathResolver {
    tools_dir: Option<PathBuf>,
    search_path: Option<std::ffi::OsString>,
}

impl ToolPathResolver {
    /// Create a resolver from the process environment
    pub fn new() -> Self {
        let tools_dir = env::var_os(TOOLS_DIR_ENV)
            .map(PathBuf::from)
            .filter(|dir| dir.is_dir());

        Self {
            tools_dir,
            search_path: env::var_os("PATH"),
        }
    }

    /// Create a resolver with an explicit tools directory and search path
    pub fn with_paths(tools_dir: Option<PathBuf>, search_path: Option<std::ffi::OsString>) -> Self {
        Self { tools_dir, search_path }
    }

    /// Resolve the path to a specific tool
    pub fn resolve_tool(&self, tool_name: &str) -> Option<PathBuf> {
        let file_name = executable_name(tool_name);

        if let Some(ref tools_dir) = self.tools_dir {
            let bundled = tools_dir.join(&file_name);
            debug!("Checking tools dir: {:?}", bundled);
            if bundled.is_file() {
                return Some(bundled);
            }
        }

        let found = self
            .search_path
            .as_ref()
            .and_then(|paths| env::split_paths(paths).map(|dir| dir.join(&file_name)).find(|p| p.is_file()));

        debug!("Resolved {} -> {:?}", tool_name, found);
        found
    }

    /// Path to cwebp, if installed
    pub fn cwebp(&self) -> Option<PathBuf> {
        self.resolve_tool("cwebp")
    }

    /// Check if a tool is available and provide installation instructions if not
    pub fn check_tool_with_instructions(&self, tool_name: &str) -> Result<PathBuf, String> {
        self.resolve_tool(tool_name).ok_or_else(|| {
            format!(
                "Tool '{}' not found in {} or PATH.\nTo install, run:\n  {}",
                tool_name,
                TOOLS_DIR_ENV,
                install_instructions(tool_name)
            )
        })
    }
}

impl Default for ToolPathResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn executable_name(tool_name: &str) -> String {
    if cfg!(windows) {
        format!("{}.exe", tool_name)
    } else {
        tool_name.to_string()
    }
}

fn install_instructions(tool_name: &str) -> String {
    let package = match tool_name {
        "cwebp" | "dwebp" => "webp",
        other => other,
    };

    if cfg!(target_os = "macos") {
        format!("brew install {}", package)
    } else if cfg!(windows) {
        format!("download {} from https://developers.google.com/speed/webp/download", package)
    } else {
        format!("sudo apt-get install {}", package)
    }
}
