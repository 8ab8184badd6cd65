// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `main.rs` - command line parsing and watch collection

#[cfg(test)]
mod tests {
    use super::super::*;
    use clap::error::ErrorKind;
    use poolwatch::config::ConfigEntry;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("poolwatch").chain(args.iter().copied()))
    }

    #[test]
    fn test_no_arguments() {
        let cli = parse(&[]).unwrap();

        assert!(cli.source.is_none());
        assert!(cli.output.is_none());
        assert!(cli.config.is_none());
        assert!(collect_watches(&cli, &Settings::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_source_and_output_require_each_other() {
        let err = parse(&["--source", "file:///in"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);

        let err = parse(&["--output", "file:///out"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_source_given_twice_is_rejected() {
        let err = parse(&[
            "--source",
            "file:///a",
            "--source",
            "file:///b",
            "--output",
            "file:///out",
        ])
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_version_short_circuits() {
        let err = parse(&["--version"]).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_command_line_watch_comes_first() {
        let cli = parse(&[
            "--source",
            "file:///etc/template.json?period=1s",
            "--output",
            "file:///run/config.json",
            "--config",
            "/etc/poolwatch.yaml",
        ])
        .unwrap();
        let mut settings = Settings::default();
        settings.configs.push(ConfigEntry {
            source: "file:///etc/other.json".to_string(),
            output: "file:///run/other.json".to_string(),
        });

        let watches = collect_watches(&cli, &settings).unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("/etc/poolwatch.yaml")));
        assert_eq!(watches.len(), 2);
        assert!(watches[0].to_string().starts_with("file:///etc/template.json -> "));
        assert!(watches[1].to_string().starts_with("file:///etc/other.json -> "));
    }

    #[test]
    fn test_invalid_command_line_watch_is_an_error() {
        let cli = parse(&["--source", "ftp://in", "--output", "file:///out"]).unwrap();

        let err = collect_watches(&cli, &Settings::default()).unwrap_err();

        assert!(
            format!("{err:#}").contains("Unsupported source type: ftp"),
            "{err:#}"
        );
    }

    #[tokio::test]
    async fn test_server_exit_pends_when_disabled() {
        let exit = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            server_exit(None),
        )
        .await;

        assert!(exit.is_err(), "should still be pending");
    }

    #[tokio::test]
    async fn test_server_exit_reports_task_result() {
        let mut handle: JoinHandle<Result<()>> =
            tokio::spawn(async { Err(anyhow::anyhow!("bind failed")) });

        let err = server_exit(Some(&mut handle)).await.unwrap_err();

        assert_eq!(err.to_string(), "bind failed");
    }
}
