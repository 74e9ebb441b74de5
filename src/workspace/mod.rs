mod config;

pub use config::{
    config_dir, config_file_path, ensure_workspace_structure, load_from, load_or_default, save,
    workspace_root, AiSettings, AppConfig, ApprovalSettings, CacheSettings, NavigationSettings,
    ProviderKind, WorkspacePaths, API_KEY_ENV, CONFIG_FILE_NAME, HOME_ENV,
};
