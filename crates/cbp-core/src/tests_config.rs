#[cfg(test)]
mod tests {
    use crate::config::*;
    use crate::layer::CompactBilinearPooling;
    use crate::pooling::{Normalization, Pooling};
    use std::env;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_valid() {
        let config = CbpConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.options.pooling, Pooling::Sum);
        assert_eq!(config.options.normalization, Normalization::None);
        assert_eq!(config.options.seed, None);
    }

    #[test]
    fn test_config_validation_dims() {
        let mut config = CbpConfig::new(8, 8, 16);
        assert!(config.validate().is_ok());

        config.output_dim = 0;
        assert!(config.validate().is_err());

        config.output_dim = 16;
        config.input_dim1 = 0;
        assert!(config.validate().is_err());

        config.input_dim1 = 8;
        config.input_dim2 = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_toml_string() {
        let toml_str = r#"
            input_dim1 = 64
            input_dim2 = 32
            output_dim = 1024

            [options]
            seed = 17
            pooling = "average"
            normalization = "signed_sqrt_l2"
        "#;

        let config = CbpConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.input_dim1, 64);
        assert_eq!(config.input_dim2, 32);
        assert_eq!(config.output_dim, 1024);
        assert_eq!(config.options.seed, Some(17));
        assert_eq!(config.options.pooling, Pooling::Average);
        assert_eq!(config.options.normalization, Normalization::SignedSqrtL2);
    }

    #[test]
    fn test_config_options_default_when_missing() {
        let config = CbpConfig::from_toml_str("input_dim1 = 4\ninput_dim2 = 4\noutput_dim = 8\n").unwrap();
        assert_eq!(config.options, CbpOptions::default());
    }

    #[test]
    fn test_config_rejects_unknown_pooling() {
        let toml_str = r#"
            input_dim1 = 4
            input_dim2 = 4
            output_dim = 8

            [options]
            pooling = "max"
        "#;
        let err = CbpConfig::from_toml_str(toml_str).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_config_rejects_zero_output_dim() {
        let err = CbpConfig::from_toml_str("input_dim1 = 4\ninput_dim2 = 4\noutput_dim = 0\n")
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_config_save_and_load() {
        let config = CbpConfig {
            input_dim1: 16,
            input_dim2: 8,
            output_dim: 256,
            options: CbpOptions::default()
                .with_seed(99)
                .with_pooling(Pooling::None)
                .with_normalization(Normalization::L2),
        };

        let file = NamedTempFile::new().unwrap();
        config.save_to_file(file.path()).unwrap();
        let loaded = CbpConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_to_toml_string() {
        let config = CbpConfig::new(4, 4, 8);
        let toml_str = config.to_toml_string().unwrap();
        assert!(toml_str.contains("output_dim = 8"));
        assert!(toml_str.contains("[options]"));
        assert!(toml_str.contains("pooling = \"sum\""));
    }

    #[test]
    fn test_config_missing_file_is_io_error() {
        let err = CbpConfig::from_file("/nonexistent/cbp.toml").unwrap_err();
        assert_eq!(err.code(), "IO_ERROR");
    }

    #[test]
    fn test_env_overrides() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "input_dim1 = 8\ninput_dim2 = 8\noutput_dim = 16").unwrap();

        env::set_var("CBP_OUTPUT_DIM", "64");
        env::set_var("CBP_SEED", "1234");
        env::set_var("CBP_POOLING", "none");
        env::set_var("CBP_NORMALIZATION", "l2");
        let config = CbpConfig::from_file_with_env(file.path());

        env::set_var("CBP_POOLING", "median");
        let mut bad = CbpConfig::new(8, 8, 16);
        let bad_result = bad.apply_env_overrides();

        env::set_var("CBP_POOLING", "none");
        env::set_var("CBP_SEED", (MAX_SEED + 1).to_string());
        let oversized_seed = CbpConfig::from_file_with_env(file.path());

        env::remove_var("CBP_OUTPUT_DIM");
        env::remove_var("CBP_SEED");
        env::remove_var("CBP_POOLING");
        env::remove_var("CBP_NORMALIZATION");

        let config = config.unwrap();
        assert_eq!(config.output_dim, 64);
        assert_eq!(config.options.seed, Some(1234));
        assert_eq!(config.options.pooling, Pooling::None);
        assert_eq!(config.options.normalization, Normalization::L2);
        assert!(bad_result.unwrap_err().is_config());
        assert!(oversized_seed.unwrap_err().is_config());
    }

    #[test]
    fn test_layer_from_config() {
        let config = CbpConfig::from_toml_str(
            "input_dim1 = 6\ninput_dim2 = 3\noutput_dim = 32\n[options]\nseed = 3\n",
        )
        .unwrap();
        let layer = CompactBilinearPooling::from_config(&config).unwrap();
        assert_eq!(layer.input_dim1(), 6);
        assert_eq!(layer.input_dim2(), 3);
        assert_eq!(layer.output_dim(), 32);
        assert_eq!(layer.seed(), Some(3));
    }

    #[test]
    fn test_unseeded_layer_seed_survives_save_and_load() {
        for _ in 0..16 {
            let layer = CompactBilinearPooling::new(4, 6, 32, CbpOptions::default()).unwrap();
            let seed = layer.seed().unwrap();
            assert!(seed <= MAX_SEED);

            let config = CbpConfig {
                input_dim1: 4,
                input_dim2: 6,
                output_dim: 32,
                options: CbpOptions::default().with_seed(seed),
            };
            let file = NamedTempFile::new().unwrap();
            config.save_to_file(file.path()).unwrap();
            let loaded = CbpConfig::from_file(file.path()).unwrap();
            assert_eq!(loaded.options.seed, Some(seed));

            let replay = CompactBilinearPooling::from_config(&loaded).unwrap();
            assert_eq!(replay.mapping1(), layer.mapping1());
            assert_eq!(replay.mapping2(), layer.mapping2());
        }
    }

    #[test]
    fn test_seed_boundary() {
        let config = CbpConfig {
            options: CbpOptions::default().with_seed(MAX_SEED),
            ..CbpConfig::new(4, 4, 8)
        };
        let toml_str = config.to_toml_string().unwrap();
        assert_eq!(CbpConfig::from_toml_str(&toml_str).unwrap(), config);

        let oversized = CbpConfig {
            options: CbpOptions::default().with_seed(MAX_SEED + 1),
            ..CbpConfig::new(4, 4, 8)
        };
        assert!(oversized.validate().unwrap_err().is_config());
        let err = CompactBilinearPooling::new(4, 4, 8, oversized.options).unwrap_err();
        assert!(err.is_config());

        let err = CbpConfig::from_toml_str(
            "input_dim1 = 4\ninput_dim2 = 4\noutput_dim = 8\n[options]\nseed = 18446744073709551615\n",
        )
        .unwrap_err();
        assert!(err.is_config());
    }
}
