// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for output descriptors

#[cfg(test)]
mod tests {
    use crate::errors::DescriptorError;
    use crate::output::{parse_output, Attributes, FileOutput, Output};
    use std::path::Path;

    fn file_output(dsn: &str) -> FileOutput {
        let Output::File(output) = parse_output(dsn).unwrap();
        output
    }

    #[test]
    fn test_parses_with_defaults() {
        let output = file_output("file:///run/mcrouter/config.json");

        assert_eq!(output.path(), Path::new("/run/mcrouter/config.json"));
        assert_eq!(*output.attributes(), Attributes::default());
        assert_eq!(output.attributes().mode, Some(0o644));
        assert_eq!(output.attributes().uid, None);
        assert_eq!(output.attributes().gid, None);
    }

    #[test]
    fn test_parses_custom_attributes() {
        let output = file_output("file:///run/config.json?uid=123&gid=456&mode=0765");

        assert_eq!(
            *output.attributes(),
            Attributes {
                uid: Some(123),
                gid: Some(456),
                mode: Some(0o765),
            }
        );
    }

    #[test]
    fn test_mode_without_leading_zero_is_octal() {
        let output = file_output("file:///run/config.json?mode=640");

        assert_eq!(output.attributes().mode, Some(0o640));
    }

    #[test]
    fn test_ignores_unknown_parameters() {
        let output = file_output("file:///run/config.json?owner=root&uid=0");

        assert_eq!(output.attributes().uid, Some(0));
    }

    #[test]
    fn test_rejects_relative_path() {
        let err = parse_output("file://foo/bar/baz").unwrap_err();

        assert_eq!(
            err,
            DescriptorError::RelativePath {
                path: "foo/bar/baz".to_string()
            }
        );
    }

    #[test]
    fn test_rejects_non_file_scheme() {
        let err = parse_output("nonfile://foo").unwrap_err();

        assert_eq!(err.to_string(), "Unsupported output type: nonfile");
    }

    #[test]
    fn test_rejects_invalid_numbers() {
        for dsn in [
            "file:///run/config.json?uid=root",
            "file:///run/config.json?gid=-1",
            "file:///run/config.json?mode=0999",
            "file:///run/config.json?uid",
        ] {
            assert!(
                matches!(parse_output(dsn), Err(DescriptorError::InvalidParameter { .. })),
                "{dsn}"
            );
        }
    }

    #[test]
    fn test_rejects_mode_out_of_range() {
        for dsn in ["file:///run/config.json?mode=0400", "file:///run/config.json?mode=01777"] {
            let err = parse_output(dsn).unwrap_err();
            assert!(
                matches!(err, DescriptorError::InvalidParameter { ref name, .. } if name == "mode"),
                "{dsn}: {err}"
            );
        }
    }

    #[test]
    fn test_accepts_mode_bounds() {
        assert_eq!(file_output("file:///a?mode=0600").attributes().mode, Some(0o600));
        assert_eq!(file_output("file:///a?mode=0777").attributes().mode, Some(0o777));
    }

    #[test]
    fn test_display() {
        let output = file_output("file:///run/config.json?uid=1&mode=0640");

        assert_eq!(
            output.to_string(),
            "file:///run/config.json[uid=1, gid=-, mode=0640]"
        );
        assert_eq!(
            Attributes {
                uid: None,
                gid: None,
                mode: None
            }
            .to_string(),
            "[uid=-, gid=-, mode=-]"
        );
    }

    #[test]
    fn test_file_output_new_validates() {
        assert!(FileOutput::new("/run/config.json", Attributes::default()).is_ok());
        assert!(FileOutput::new("config.json", Attributes::default()).is_err());
    }
}
