//! Command model for a single extraction invocation
//!
//! A [`Request`] collects the option flags, raw trailing tokens, and target
//! URLs for one run of the extraction tool and serializes them into an
//! argument vector with [`Request::build_command`]. Options form an ordered
//! multimap: insertion order is preserved and repeating an option name
//! appends further argument entries instead of replacing earlier ones.

/// Argument list builder for one extraction-tool invocation
#[derive(Debug, Clone, Default)]
pub struct Request {
    urls: Vec<String>,
    options: Vec<(String, Vec<String>)>,
    raw_args: Vec<String>,
}

impl Request {
    /// Create a request targeting a single URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            ..Self::default()
        }
    }

    /// Create a request targeting multiple URLs (emitted in order)
    pub fn with_urls(urls: Vec<String>) -> Self {
        Self {
            urls,
            ..Self::default()
        }
    }

    /// Add a bare option flag (emitted without arguments)
    ///
    /// Adding the same name again is a no-op for bare flags; adding an
    /// argument later upgrades the entry to an argument-carrying option.
    pub fn add_option(&mut self, name: impl Into<String>) -> &mut Self {
        let name = name.into();
        if !self.options.iter().any(|(n, _)| *n == name) {
            self.options.push((name, Vec::new()));
        }
        self
    }

    /// Add an option with one argument, appending if the option already exists
    ///
    /// Arguments accept anything `Display`-able so numeric values work
    /// without explicit formatting at the call site.
    pub fn add_option_arg(
        &mut self,
        name: impl Into<String>,
        argument: impl ToString,
    ) -> &mut Self {
        let name = name.into();
        let argument = argument.to_string();
        if let Some((_, args)) = self.options.iter_mut().find(|(n, _)| *n == name) {
            args.push(argument);
        } else {
            self.options.push((name, vec![argument]));
        }
        self
    }

    /// Append raw command tokens, emitted verbatim after options and before URLs
    pub fn add_raw_args(&mut self, args: Vec<String>) -> &mut Self {
        self.raw_args.extend(args);
        self
    }

    /// Whether an option with this name has been added
    pub fn has_option(&self, name: &str) -> bool {
        self.options.iter().any(|(n, _)| n == name)
    }

    /// First argument recorded for an option, if any
    pub fn get_option(&self, name: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, args)| args.first())
            .map(String::as_str)
    }

    /// All arguments recorded for an option, if the option was added
    pub fn get_arguments(&self, name: &str) -> Option<&[String]> {
        self.options
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, args)| args.as_slice())
    }

    /// Target URLs of this request
    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// Serialize into the argument vector passed to the tool
    ///
    /// Ordering is deterministic: options in insertion order (the flag is
    /// repeated before each of its arguments, or emitted once when bare),
    /// then raw tokens in insertion order, then URLs in insertion order.
    pub fn build_command(&self) -> Vec<String> {
        let mut command = Vec::new();
        for (name, args) in &self.options {
            if args.is_empty() {
                command.push(name.clone());
            } else {
                for arg in args {
                    command.push(name.clone());
                    command.push(arg.clone());
                }
            }
        }
        command.extend(self.raw_args.iter().cloned());
        command.extend(self.urls.iter().cloned());
        command
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_command_orders_options_then_raw_then_urls() {
        let mut request = Request::new("https://example.com/watch?v=abc");
        request
            .add_option("--no-mtime")
            .add_option_arg("-f", "best")
            .add_raw_args(vec!["--".to_string()]);

        assert_eq!(
            request.build_command(),
            vec![
                "--no-mtime",
                "-f",
                "best",
                "--",
                "https://example.com/watch?v=abc",
            ]
        );
    }

    #[test]
    fn repeated_option_appends_and_repeats_flag() {
        let mut request = Request::new("https://example.com/v");
        request
            .add_option_arg("--external-downloader-args", "aria2c:--summary-interval=1")
            .add_option_arg("--external-downloader-args", "aria2c:--ca-certificate=/c.pem");

        assert_eq!(
            request.build_command(),
            vec![
                "--external-downloader-args",
                "aria2c:--summary-interval=1",
                "--external-downloader-args",
                "aria2c:--ca-certificate=/c.pem",
                "https://example.com/v",
            ]
        );
    }

    #[test]
    fn insertion_order_is_independent_of_add_count() {
        let mut request = Request::new("u");
        request
            .add_option_arg("-o", "/tmp/%(title)s.%(ext)s")
            .add_option("--no-cache-dir")
            .add_option_arg("-o", "ignored-second-template");

        let command = request.build_command();
        // "-o" keeps its original position even though it was added again last
        assert_eq!(command[0], "-o");
        assert_eq!(command[4], "--no-cache-dir");
    }

    #[test]
    fn bare_flag_emitted_without_arguments() {
        let mut request = Request::new("u");
        request.add_option("--dump-json");
        assert_eq!(request.build_command(), vec!["--dump-json", "u"]);
    }

    #[test]
    fn numeric_arguments_are_formatted() {
        let mut request = Request::new("u");
        request.add_option_arg("--retries", 3);
        assert_eq!(request.build_command(), vec!["--retries", "3", "u"]);
    }

    #[test]
    fn accessors_report_first_and_all_arguments() {
        let mut request = Request::new("u");
        request
            .add_option_arg("--add-header", "A:1")
            .add_option_arg("--add-header", "B:2");

        assert!(request.has_option("--add-header"));
        assert!(!request.has_option("--cookies"));
        assert_eq!(request.get_option("--add-header"), Some("A:1"));
        assert_eq!(
            request.get_arguments("--add-header"),
            Some(&["A:1".to_string(), "B:2".to_string()][..])
        );
        assert_eq!(request.get_arguments("--cookies"), None);
    }

    #[test]
    fn multiple_urls_appended_last_in_order() {
        let mut request =
            Request::with_urls(vec!["https://a.example".to_string(), "https://b.example".to_string()]);
        request.add_option("--no-mtime");

        let command = request.build_command();
        assert_eq!(&command[command.len() - 2..], &["https://a.example", "https://b.example"]);
    }
}
