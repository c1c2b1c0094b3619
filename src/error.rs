#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Config,
    Execution,
    Server,
    Internal,
}

impl ErrorCategory {
    pub fn code(self) -> &'static str {
        match self {
            ErrorCategory::Input => "INPUT",
            ErrorCategory::Config => "CONFIG",
            ErrorCategory::Execution => "EXECUTION",
            ErrorCategory::Server => "SERVER",
            ErrorCategory::Internal => "INTERNAL",
        }
    }

    pub fn hint(self) -> &'static str {
        match self {
            ErrorCategory::Input => {
                "Run agent-strands --help. Execution modes are sequential, parallel and graph."
            }
            ErrorCategory::Config => {
                "Check --config-path/--profile and the field names under [profiles.<name>]."
            }
            ErrorCategory::Execution => {
                "An agent failed mid-run. Retry with --logs or RUST_LOG=info to find it."
            }
            ErrorCategory::Server => {
                "Check --host/--port and that the address is not already in use."
            }
            ErrorCategory::Internal => {
                "Retry with RUST_LOG=debug. If it persists, capture logs and open an issue."
            }
        }
    }
}

pub fn categorize_error(err: &anyhow::Error) -> ErrorCategory {
    let msg = format!("{err:#}").to_ascii_lowercase();

    if msg.contains("profile configuration")
        || msg.contains("profile config file")
        || msg.contains("work_scale")
    {
        return ErrorCategory::Config;
    }

    if msg.contains("invalid value")
        || msg.contains("unknown execution mode")
        || msg.contains("invalid --input")
        || msg.contains("not found")
        || msg.contains("profile")
        || msg.contains("empty input")
    {
        return ErrorCategory::Input;
    }

    if msg.contains("failed in strand")
        || msg.contains("did not finish")
        || msg.contains("no agents in strand")
    {
        return ErrorCategory::Execution;
    }

    if msg.contains("bind") || msg.contains("server") || msg.contains("listener") {
        return ErrorCategory::Server;
    }

    ErrorCategory::Internal
}

pub fn format_cli_error(err: &anyhow::Error) -> String {
    let category = categorize_error(err);
    format!("[{}] {:#}\nHint: {}", category.code(), err, category.hint())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorizes_by_message() {
        let cases = [
            ("Unknown execution mode: loop", ErrorCategory::Input),
            ("profile 'ops' not found in 'x'", ErrorCategory::Input),
            ("invalid profile configuration in 'x'", ErrorCategory::Config),
            ("agent 'intake' failed in strand 's'", ErrorCategory::Execution),
            ("failed to bind server listener", ErrorCategory::Server),
            ("something else", ErrorCategory::Internal),
        ];
        for (message, expected) in cases {
            assert_eq!(
                categorize_error(&anyhow::anyhow!(message)),
                expected,
                "{message}"
            );
        }
    }

    #[test]
    fn formatted_error_carries_code_and_hint() {
        let err = anyhow::anyhow!("Empty input received")
            .context("agent 'intake' failed in strand 's'");
        let rendered = format_cli_error(&err);
        assert!(rendered.starts_with("[INPUT]"));
        assert!(rendered.contains("Empty input received"));
        assert!(rendered.contains("Hint:"));
    }
}
