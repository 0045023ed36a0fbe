#[cfg(test)]
mod tests {
    use std::env;

    use crate::config::{self, AppConfig};
    use crate::recognition::{Detector, Metric, Model};

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.store.root, std::path::PathBuf::from("data/faces"));
        assert_eq!(config.store.image_extensions, vec!["jpg", "jpeg", "png"]);
        assert!(config.store.cache_patterns.iter().any(|p| p == "representations_*.pkl"));
        assert_eq!(config.recognition.metric, Metric::EuclideanL2);
        assert_eq!(config.recognition.model, Model::ArcFace);
        assert_eq!(config.recognition.detector, Detector::Retinaface);
        assert_eq!(config.recognition.timeout_secs, 60);
        assert!(config.recognition.threshold.is_none());
        assert!(!config.preprocess.resize);
        assert_eq!((config.preprocess.width, config.preprocess.height), (300, 300));
        assert!(config.security.is_none());
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(config::validate(&AppConfig::default()).is_ok());
    }

    // Single test touching the process environment, so parallel tests cannot observe it
    #[test]
    fn test_load_and_env_override() {
        assert!(config::load().is_ok());

        env::set_var("FACEDIR__SERVER__PORT", "0");
        let result = config::load();
        env::remove_var("FACEDIR__SERVER__PORT");
        assert!(result.unwrap_err().to_string().contains("invalid server.port"));

        env::set_var("FACEDIR__RECOGNITION__METRIC", "cosine");
        let result = config::load();
        env::remove_var("FACEDIR__RECOGNITION__METRIC");
        assert_eq!(result.unwrap().recognition.metric, Metric::Cosine);
    }

    #[test]
    fn test_validate_rejections() {
        let mut cfg = AppConfig::default();
        cfg.recognition.timeout_secs = 0;
        assert!(config::validate(&cfg).is_err());

        let mut cfg = AppConfig::default();
        cfg.recognition.threshold = Some(f64::NAN);
        assert!(config::validate(&cfg).is_err());

        let mut cfg = AppConfig::default();
        cfg.store.cache_patterns = vec!["[unclosed".into()];
        assert!(config::validate(&cfg).is_err());

        let mut cfg = AppConfig::default();
        cfg.store.image_extensions = vec![" ".into()];
        assert!(config::validate(&cfg).is_err());

        let mut cfg = AppConfig::default();
        cfg.recognition.command = String::new();
        assert!(config::validate(&cfg).is_err());

        let mut cfg = AppConfig::default();
        cfg.preprocess.width = 0;
        assert!(config::validate(&cfg).is_err());
    }
}
