pub struct DefaultsConfig {
    pub project: String,
    pub store: String,
    pub work_dir: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            project: "default".to_string(),
            store: "multifold-artifacts".to_string(),
            work_dir: "multifold-work".to_string(),
        }
    }
}
