//! CLI definitions using clap.

use std::ffi::OsString;

use clap::Parser;

/// Link workspace packages to each other, pack the scripts package and run
/// the generator against it. Manifests are restored from git afterwards.
///
/// linkpack has no options of its own: every argument goes to the generator.
#[derive(Parser, Debug)]
#[command(name = "linkpack")]
#[command(author, version, about, long_about = None)]
#[command(disable_help_flag = true, disable_version_flag = true)]
pub struct Cli {
    /// Arguments passed through verbatim to the generator
    #[arg(
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_parser = clap::value_parser!(OsString)
    )]
    pub args: Vec<OsString>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passes_everything_through() {
        let cli = Cli::parse_from(["linkpack", "my-app", "--help", "-V", "--template=ts"]);
        assert_eq!(cli.args, ["my-app", "--help", "-V", "--template=ts"]);
    }

    #[test]
    fn test_leading_flag_is_passed_through() {
        let cli = Cli::parse_from(["linkpack", "--version"]);
        assert_eq!(cli.args, ["--version"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_argument_is_accepted() {
        use std::os::unix::ffi::OsStringExt;

        let raw = OsString::from_vec(b"caf\xff".to_vec());
        let cli = Cli::try_parse_from([OsString::from("linkpack"), raw.clone()]).unwrap();
        assert_eq!(cli.args, [raw]);
    }

    #[test]
    fn test_no_arguments() {
        let cli = Cli::parse_from(["linkpack"]);
        assert!(cli.args.is_empty());
    }
}
