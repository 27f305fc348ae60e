use indicatif::ProgressStyle;

/// Extension trait for creating labelled progress-bar styles.
pub trait NamedProgress {
    /// Creates a progress bar style carrying a name label.
    fn named_bar(name: &str) -> Self;
}

impl NamedProgress for ProgressStyle {
    fn named_bar(name: &str) -> Self {
        let fmt = format!(
            "{name:<24}{{wide_bar:40.cyan/blue}} {{pos:>7}}/{{len:<7}} [{{elapsed_precise}} ({{eta}} remaining)]"
        );
        ProgressStyle::default_bar()
            .template(&fmt)
            .unwrap_or(ProgressStyle::default_bar())
    }
}
