//! Lexer configuration
//!
//! Feature flags controlling which constructs the lexer recognizes, plus
//! character-handling and error-handling modes. Factory presets cover the
//! common shell entry points.

/// Configuration for lexer behavior and features.
#[derive(Debug, Clone)]
pub struct LexerConfig {
    // Quote processing
    pub enable_double_quotes: bool,
    pub enable_single_quotes: bool,
    pub enable_backtick_quotes: bool,

    // Variable and expansion features
    pub enable_variable_expansion: bool,
    pub enable_brace_expansion: bool,
    pub enable_parameter_expansion: bool,
    pub enable_command_substitution: bool,
    pub enable_arithmetic_expansion: bool,
    pub enable_process_substitution: bool,

    // Operator and syntax features
    pub enable_pipes: bool,
    pub enable_redirections: bool,
    pub enable_heredocs: bool,
    pub enable_background: bool,
    pub enable_logical_operators: bool,
    pub enable_compound_commands: bool, // (( )) and [[ ]]
    pub enable_regex_operators: bool,   // =~

    // Advanced syntax
    pub enable_tilde_expansion: bool,
    pub enable_glob_patterns: bool,
    pub enable_extglob: bool,

    // Character handling
    pub posix_mode: bool,
    pub unicode_identifiers: bool,
    pub case_sensitive: bool,

    // Error handling
    pub strict_mode: bool,
    pub recovery_mode: bool,
    pub max_errors: usize,

    // Compatibility
    pub bash_compatibility: bool,
    pub sh_compatibility: bool,
}

impl Default for LexerConfig {
    fn default() -> Self {
        Self {
            enable_double_quotes: true,
            enable_single_quotes: true,
            enable_backtick_quotes: true,
            enable_variable_expansion: true,
            enable_brace_expansion: true,
            enable_parameter_expansion: true,
            enable_command_substitution: true,
            enable_arithmetic_expansion: true,
            enable_process_substitution: true,
            enable_pipes: true,
            enable_redirections: true,
            enable_heredocs: true,
            enable_background: true,
            enable_logical_operators: true,
            enable_compound_commands: true,
            enable_regex_operators: true,
            enable_tilde_expansion: true,
            enable_glob_patterns: true,
            enable_extglob: false,
            posix_mode: false,
            unicode_identifiers: true,
            case_sensitive: true,
            strict_mode: true,
            recovery_mode: false,
            max_errors: 10,
            bash_compatibility: true,
            sh_compatibility: false,
        }
    }
}

impl LexerConfig {
    /// Interactive shell: recover from errors and keep prompting.
    pub fn interactive() -> Self {
        Self {
            strict_mode: false,
            recovery_mode: true,
            max_errors: 25,
            ..Self::default()
        }
    }

    /// Batch/script execution: fail fast on the first error.
    pub fn batch() -> Self {
        Self {
            strict_mode: true,
            recovery_mode: false,
            ..Self::default()
        }
    }

    /// Performance-lean preset: ASCII identifiers, no recovery bookkeeping.
    pub fn performance() -> Self {
        Self {
            unicode_identifiers: false,
            strict_mode: true,
            recovery_mode: false,
            ..Self::default()
        }
    }

    /// Debug preset: recover and collect as many diagnostics as possible.
    pub fn debug() -> Self {
        Self {
            strict_mode: false,
            recovery_mode: true,
            max_errors: 100,
            ..Self::default()
        }
    }

    /// Strict POSIX subset: ASCII identifiers, no bashisms.
    pub fn posix() -> Self {
        Self {
            posix_mode: true,
            unicode_identifiers: false,
            enable_process_substitution: false,
            enable_regex_operators: false,
            enable_extglob: false,
            bash_compatibility: false,
            sh_compatibility: true,
            ..Self::default()
        }
    }
}
