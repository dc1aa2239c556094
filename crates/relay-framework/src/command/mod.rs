//! Structured command options parsed with clap.
//!
//! A listener finished with [`MessageListen::command`] fires on its pattern
//! followed by an optional argument string. The arguments are split with
//! [`shell_split`] and parsed into the handler's option type:
//!
//! ```rust,ignore
//! #[derive(clap::Parser)]
//! struct Deploy {
//!     /// Service to deploy
//!     service: String,
//!     #[arg(long)]
//!     force: bool,
//! }
//!
//! listen_to("deploy").command(|ops: Arc<Ops>, msg, args: Deploy| async move {
//!     format!("deploying {} (force: {})", args.service, args.force)
//! })
//! ```
//!
//! [`MessageListen::command`]: crate::MessageListen::command

mod split;

pub use split::shell_split;

use clap::Parser;

use crate::pattern::MatchArgs;

/// Name shown in usage lines: the pattern without its anchors.
pub(crate) fn program_name(pattern: &str) -> String {
    pattern
        .trim_start_matches('^')
        .trim_end_matches('$')
        .trim()
        .to_owned()
}

/// Parses the trailing argument group of `args` into `T`.
pub(crate) fn parse<T: Parser>(program: &str, args: &MatchArgs) -> Result<T, clap::Error> {
    let argv = args
        .iter()
        .last()
        .flatten()
        .map(shell_split)
        .unwrap_or_default();
    T::try_parse_from(std::iter::once(program.to_owned()).chain(argv))
}

/// Renders the `--help` text of `T`.
pub(crate) fn render_help<T: Parser>(program: &str) -> String {
    T::command()
        .bin_name(program.to_owned())
        .render_help()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Pattern;

    #[derive(Parser, Debug)]
    struct Deploy {
        /// Service to deploy
        service: String,
        #[arg(long)]
        force: bool,
    }

    fn captured(text: &str) -> MatchArgs {
        Pattern::command("^deploy", false)
            .unwrap()
            .captures(text)
            .unwrap()
    }

    #[test]
    fn test_program_name() {
        assert_eq!(program_name("^deploy$"), "deploy");
        assert_eq!(program_name("status"), "status");
    }

    #[test]
    fn test_parse_options() {
        let parsed: Deploy = parse("deploy", &captured("deploy web --force")).unwrap();
        assert_eq!(parsed.service, "web");
        assert!(parsed.force);
    }

    #[test]
    fn test_parse_error_mentions_usage() {
        let err = parse::<Deploy>("deploy", &captured("deploy")).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("<SERVICE>"), "{text}");
        assert!(text.contains("Usage"), "{text}");
    }

    #[test]
    fn test_help_is_rendered() {
        let help = render_help::<Deploy>("deploy");
        assert!(help.contains("Service to deploy"));
        assert!(help.contains("--force"));
    }
}
