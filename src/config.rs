//! Configuration file parsing.
//!
//! The configuration is line-oriented UTF-8. Two line kinds exist:
//!
//! - `dev: <path> [<code-spec-list>] [shared]` binds an input device and
//!   assigns its listed event codes to the next run of global button numbers.
//! - `<pattern>: <command>` compiles to a [`Rule`]. The pattern is a
//!   comma-separated token sequence, optionally followed by ` < <seconds>`.
//!
//! Pattern tokens:
//!
//! - `Nv` matches a press of button N, `N^` a release.
//! - A bare `N` between other tokens matches either polarity of button N.
//! - A pattern that is nothing but a bare `N` is shorthand for `Nv,N^` with
//!   both elements capped at `max_use = 0`: the rule fires once per physical
//!   press/release cycle, and only if neither half has already participated
//!   in another rule's match.
//!
//! Rules keep declaration order; overlapping patterns are disambiguated by
//! putting the more specific rule first, never by the engine guessing.

use crate::ecodes;
use crate::error::{Error, Result};
use crate::event::{Action, Button};
use crate::history::HistoryEntry;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Which polarities a pattern element accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionFilter {
    /// Only a press.
    DownOnly,
    /// Only a release.
    UpOnly,
    /// Either polarity.
    Any,
}

impl ActionFilter {
    /// Does this filter accept the given action?
    pub fn accepts(&self, action: Action) -> bool {
        match self {
            ActionFilter::DownOnly => action == Action::Down,
            ActionFilter::UpOnly => action == Action::Up,
            ActionFilter::Any => true,
        }
    }
}

/// One position within a rule's pattern sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternElement {
    /// The button this element matches.
    pub button: Button,
    /// Accepted polarities.
    pub filter: ActionFilter,
    /// Cap on how many prior rule matches the history entry may have
    /// participated in. `Some(0)` means "only if never used"; `None` is
    /// uncapped.
    pub max_use: Option<u32>,
}

impl PatternElement {
    /// Does this element match the history entry?
    pub fn matches(&self, entry: &HistoryEntry) -> bool {
        self.button == entry.event.button
            && self.filter.accepts(entry.event.action)
            && self.max_use.map_or(true, |m| entry.used <= m)
    }
}

/// One compiled pattern/command rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// Pattern elements, in order. Never empty.
    pub sequence: Vec<PatternElement>,
    /// Maximum elapsed time between the earliest matched entry and the
    /// triggering event.
    pub time_limit: Option<Duration>,
    /// Shell command passed verbatim to the sink.
    pub command: String,
    /// 1-based line in the configuration file, for diagnostics.
    pub source_line: u32,
}

impl Rule {
    /// A rule fires on press when its final element only accepts presses;
    /// otherwise it fires on release.
    pub fn fires_on_press(&self) -> bool {
        self.sequence
            .last()
            .map(|e| e.filter == ActionFilter::DownOnly)
            .unwrap_or(false)
    }

    /// Canonical pattern text, re-parseable to the same sequence.
    pub fn pattern_string(&self) -> String {
        // The bare-N shorthand is the only sequence carrying max_use caps;
        // print it back in shorthand since the caps are not spellable.
        if let [down, up] = self.sequence.as_slice() {
            if down.button == up.button
                && down.filter == ActionFilter::DownOnly
                && up.filter == ActionFilter::UpOnly
                && down.max_use == Some(0)
                && up.max_use == Some(0)
            {
                return down.button.to_string();
            }
        }
        let tokens: Vec<String> = self
            .sequence
            .iter()
            .map(|e| match e.filter {
                ActionFilter::DownOnly => format!("{}v", e.button),
                ActionFilter::UpOnly => format!("{}^", e.button),
                ActionFilter::Any => e.button.to_string(),
            })
            .collect();
        tokens.join(",")
    }
}

impl fmt::Display for Rule {
    /// Canonical config line: `pattern [< seconds]: command`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pattern_string())?;
        if let Some(limit) = self.time_limit {
            write!(f, " < {}", limit.as_secs_f64())?;
        }
        write!(f, ": {}", self.command)
    }
}

/// One event code a device binding listens for.
///
/// Either a bare key code (an `EV_KEY` press/release pair) or an explicit
/// `type/code=value` triple. Triples fire a synthetic press immediately
/// followed by a release whenever the matching event arrives; relative-axis
/// events (`EV_REL`) have no release of their own, so this is the only way
/// to bind them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventCodeSpec {
    /// evdev event type (`EV_KEY`, `EV_REL`, ...).
    pub event_type: u16,
    /// evdev event code within the type.
    pub code: u16,
    /// Exact value to match, for `type/code=value` triples.
    pub value: Option<i32>,
}

impl EventCodeSpec {
    /// Does this spec auto-release (synthesize a press/release pulse)?
    pub fn is_auto_release(&self) -> bool {
        self.value.is_some()
    }
}

impl fmt::Display for EventCodeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Some(v) => write!(f, "{}/{}={}", self.event_type, self.code, v),
            None => write!(f, "{}", self.code),
        }
    }
}

/// One `dev:` line.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceBinding {
    /// Device node path.
    pub path: String,
    /// Event codes, in declaration order. Their position in the flattened
    /// list of all bindings determines the global button number.
    pub codes: Vec<EventCodeSpec>,
    /// Skip the exclusive grab, leaving events visible to other readers.
    pub shared: bool,
}

impl fmt::Display for DeviceBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let specs: Vec<String> = self.codes.iter().map(|c| c.to_string()).collect();
        write!(f, "dev: {} [{}]", self.path, specs.join(","))?;
        if self.shared {
            write!(f, " [shared]")?;
        }
        Ok(())
    }
}

/// A parsed configuration: device bindings and rules, both in declaration
/// order. Immutable after load.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Compiled rules in source order.
    pub rules: Vec<Rule>,
    /// Device bindings in source order.
    pub devices: Vec<DeviceBinding>,
}

impl Config {
    /// Load and parse a configuration file.
    pub fn load(path: &Path) -> Result<Config> {
        let text = fs::read_to_string(path)?;
        Config::parse(&text, &path.display().to_string())
    }

    /// Parse configuration text. `file` is used in diagnostics only.
    pub fn parse(text: &str, file: &str) -> Result<Config> {
        let mut config = Config::default();
        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx as u32 + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(rest) = line.strip_prefix("dev:") {
                config.devices.push(parse_device_line(rest, file, line_no)?);
                continue;
            }
            let rule = parse_rule_line(line, file, line_no)?;
            if config
                .rules
                .iter()
                .any(|r| r.sequence == rule.sequence && r.time_limit == rule.time_limit && r.command == rule.command)
            {
                return Err(Error::config(file, line_no, "duplicate rule"));
            }
            config.rules.push(rule);
        }
        Ok(config)
    }

    /// Total number of global buttons across all bindings.
    ///
    /// When no devices are bound (library use, tests), falls back to the
    /// highest button number any rule references.
    pub fn button_count(&self) -> u32 {
        let bound: usize = self.devices.iter().map(|d| d.codes.len()).sum();
        if bound > 0 {
            return bound as u32;
        }
        self.rules
            .iter()
            .flat_map(|r| r.sequence.iter())
            .map(|e| e.button)
            .max()
            .unwrap_or(0)
    }

    /// Canonical configuration text. Parsing the result yields the same
    /// bindings and the same compiled rules.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for device in &self.devices {
            out.push_str(&device.to_string());
            out.push('\n');
        }
        for rule in &self.rules {
            out.push_str(&rule.to_string());
            out.push('\n');
        }
        out
    }
}

/// Parse a rule line (everything but the `dev:` prefix case).
fn parse_rule_line(line: &str, file: &str, line_no: u32) -> Result<Rule> {
    // A '#' before the first ':' comments out the colon, leaving no rule.
    // After the colon the command is verbatim; inline comments stay.
    let colon = match (line.find(':'), line.find('#')) {
        (Some(c), Some(h)) if h < c => {
            return Err(Error::config(file, line_no, "missing ':' between pattern and command"))
        }
        (Some(c), _) => c,
        (None, _) => {
            return Err(Error::config(file, line_no, "missing ':' between pattern and command"))
        }
    };
    let pattern = line[..colon].trim();
    let command = line[colon + 1..].trim().to_string();
    if pattern.is_empty() {
        return Err(Error::config(file, line_no, "empty pattern"));
    }

    let (tokens_str, time_limit) = match pattern.find('<') {
        Some(pos) => {
            let secs_str = pattern[pos + 1..].trim();
            let secs: f64 = secs_str
                .parse()
                .map_err(|_| Error::config(file, line_no, format!("malformed time limit `{secs_str}`")))?;
            if !secs.is_finite() || secs < 0.0 {
                return Err(Error::config(file, line_no, format!("malformed time limit `{secs_str}`")));
            }
            (pattern[..pos].trim(), Some(Duration::from_secs_f64(secs)))
        }
        None => (pattern, None),
    };
    if tokens_str.is_empty() {
        return Err(Error::config(file, line_no, "empty pattern"));
    }

    let tokens: Vec<&str> = tokens_str.split(',').map(str::trim).collect();
    let sequence = if tokens.len() == 1 && tokens[0].bytes().all(|b| b.is_ascii_digit()) {
        // Whole-pattern bare N: once per press/release cycle, and only if
        // neither half has been consumed by any other rule.
        let button = parse_button(tokens[0], file, line_no)?;
        vec![
            PatternElement { button, filter: ActionFilter::DownOnly, max_use: Some(0) },
            PatternElement { button, filter: ActionFilter::UpOnly, max_use: Some(0) },
        ]
    } else {
        tokens
            .iter()
            .map(|tok| parse_token(tok, file, line_no))
            .collect::<Result<Vec<_>>>()?
    };

    Ok(Rule { sequence, time_limit, command, source_line: line_no })
}

/// Parse one pattern token: `Nv`, `N^`, or bare `N` (any polarity).
fn parse_token(token: &str, file: &str, line_no: u32) -> Result<PatternElement> {
    if token.is_empty() {
        return Err(Error::config(file, line_no, "empty pattern element"));
    }
    let (digits, filter) = if let Some(prefix) = token.strip_suffix('v') {
        (prefix, ActionFilter::DownOnly)
    } else if let Some(prefix) = token.strip_suffix('^') {
        (prefix, ActionFilter::UpOnly)
    } else {
        (token, ActionFilter::Any)
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::config(file, line_no, format!("unrecognized pattern token `{token}`")));
    }
    let button = parse_button(digits, file, line_no)?;
    Ok(PatternElement { button, filter, max_use: None })
}

fn parse_button(digits: &str, file: &str, line_no: u32) -> Result<Button> {
    let button: Button = digits
        .parse()
        .map_err(|_| Error::config(file, line_no, format!("invalid button number `{digits}`")))?;
    if button == 0 {
        return Err(Error::config(file, line_no, "button numbers start at 1"));
    }
    Ok(button)
}

/// Parse the remainder of a `dev:` line: `<path> [<code-spec-list>] [shared]`.
fn parse_device_line(rest: &str, file: &str, line_no: u32) -> Result<DeviceBinding> {
    // Device lines carry no quoting; a '#' always starts a comment.
    let rest = match rest.find('#') {
        Some(pos) => &rest[..pos],
        None => rest,
    };
    let rest = rest.trim();

    let open = rest
        .find('[')
        .ok_or_else(|| Error::config(file, line_no, "device line needs a [code list], e.g. dev: /dev/input/event7 [256,257,258]"))?;
    let path = rest[..open].trim();
    if path.is_empty() {
        return Err(Error::config(file, line_no, "missing device path"));
    }
    let close = rest[open..]
        .find(']')
        .map(|p| open + p)
        .ok_or_else(|| Error::config(file, line_no, "unterminated [code list]"))?;

    let list = rest[open + 1..close].trim();
    if list.is_empty() {
        return Err(Error::config(file, line_no, "empty [code list]"));
    }
    let codes = list
        .split(',')
        .map(|spec| parse_code_spec(spec.trim(), file, line_no))
        .collect::<Result<Vec<_>>>()?;

    let tail = rest[close + 1..].trim();
    let shared = match tail {
        "" => false,
        "[shared]" => true,
        other => {
            return Err(Error::config(file, line_no, format!("unexpected trailing `{other}` on device line")))
        }
    };

    Ok(DeviceBinding { path: path.to_string(), codes, shared })
}

/// Parse one code spec: a bare key code or a `type/code=value` triple.
/// Symbolic names and integers are interchangeable everywhere.
fn parse_code_spec(spec: &str, file: &str, line_no: u32) -> Result<EventCodeSpec> {
    if spec.is_empty() {
        return Err(Error::config(file, line_no, "empty code spec"));
    }
    match spec.find('/') {
        Some(slash) => {
            let event_type = resolve_type(&spec[..slash], file, line_no)?;
            let rest = &spec[slash + 1..];
            let eq = rest.find('=').ok_or_else(|| {
                Error::config(file, line_no, format!("code spec `{spec}` needs `=value`"))
            })?;
            let code = resolve_code(&rest[..eq], file, line_no)?;
            let value: i32 = rest[eq + 1..].trim().parse().map_err(|_| {
                Error::config(file, line_no, format!("malformed value in code spec `{spec}`"))
            })?;
            Ok(EventCodeSpec { event_type, code, value: Some(value) })
        }
        None => {
            let code = resolve_code(spec, file, line_no)?;
            Ok(EventCodeSpec { event_type: ecodes::EV_KEY, code, value: None })
        }
    }
}

fn resolve_type(name: &str, file: &str, line_no: u32) -> Result<u16> {
    let name = name.trim();
    if let Ok(n) = name.parse() {
        return Ok(n);
    }
    ecodes::event_type_by_name(name)
        .ok_or_else(|| Error::config(file, line_no, format!("unknown event type `{name}`")))
}

fn resolve_code(name: &str, file: &str, line_no: u32) -> Result<u16> {
    let name = name.trim();
    if let Ok(n) = name.parse() {
        return Ok(n);
    }
    ecodes::code_by_name(name)
        .ok_or_else(|| Error::config(file, line_no, format!("unknown event code `{name}`")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Config {
        Config::parse(text, "test.conf").unwrap()
    }

    fn parse_err(text: &str) -> String {
        Config::parse(text, "test.conf").unwrap_err().to_string()
    }

    #[test]
    fn test_bare_n_desugars_with_zero_cap() {
        let config = parse("1: echo hi");
        assert_eq!(config.rules.len(), 1);
        let rule = &config.rules[0];
        assert_eq!(rule.sequence.len(), 2);
        assert_eq!(rule.sequence[0].filter, ActionFilter::DownOnly);
        assert_eq!(rule.sequence[0].max_use, Some(0));
        assert_eq!(rule.sequence[1].filter, ActionFilter::UpOnly);
        assert_eq!(rule.sequence[1].max_use, Some(0));
        assert_eq!(rule.command, "echo hi");
        assert!(!rule.fires_on_press());
    }

    #[test]
    fn test_bare_n_with_time_limit_still_desugars() {
        let config = parse("2 < 0.5: echo tap");
        let rule = &config.rules[0];
        assert_eq!(rule.sequence.len(), 2);
        assert_eq!(rule.sequence[0].max_use, Some(0));
        assert_eq!(rule.time_limit, Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_bare_n_in_sequence_is_any_polarity() {
        let config = parse("1v,2: echo combo");
        let rule = &config.rules[0];
        assert_eq!(rule.sequence.len(), 2);
        assert_eq!(rule.sequence[0].filter, ActionFilter::DownOnly);
        assert_eq!(rule.sequence[0].max_use, None);
        assert_eq!(rule.sequence[1].filter, ActionFilter::Any);
        assert_eq!(rule.sequence[1].max_use, None);
    }

    #[test]
    fn test_explicit_press_release_tokens() {
        let config = parse("1v,1^: echo cycle");
        let rule = &config.rules[0];
        assert_eq!(rule.sequence[0].filter, ActionFilter::DownOnly);
        assert_eq!(rule.sequence[1].filter, ActionFilter::UpOnly);
        assert_eq!(rule.sequence[0].max_use, None);
        assert!(!rule.fires_on_press());
    }

    #[test]
    fn test_press_final_rule_fires_on_press() {
        let config = parse("1v,2v: echo chord");
        assert!(config.rules[0].fires_on_press());
    }

    #[test]
    fn test_time_limit_parsing() {
        let config = parse("1,2,3 < 0.25: echo fast");
        assert_eq!(config.rules[0].time_limit, Some(Duration::from_millis(250)));
        assert_eq!(config.rules[0].sequence.len(), 3);
    }

    #[test]
    fn test_command_kept_verbatim_with_inline_hash() {
        let config = parse("1v: notify-send '#1 pressed' # not stripped");
        assert_eq!(config.rules[0].command, "notify-send '#1 pressed' # not stripped");
    }

    #[test]
    fn test_comments_and_blank_lines_ignored() {
        let config = parse("\n# a comment\n  \n1v: echo x\n");
        assert_eq!(config.rules.len(), 1);
    }

    #[test]
    fn test_declaration_order_preserved() {
        let config = parse("1v,2: A\n1v,3: B\n1: C\n");
        let commands: Vec<&str> = config.rules.iter().map(|r| r.command.as_str()).collect();
        assert_eq!(commands, ["A", "B", "C"]);
        assert_eq!(config.rules[2].source_line, 3);
    }

    #[test]
    fn test_missing_colon_rejected() {
        let err = parse_err("1v,2");
        assert!(err.contains("test.conf:1"), "{err}");
        assert!(err.contains("missing ':'"), "{err}");
    }

    #[test]
    fn test_hash_before_colon_rejected() {
        let err = parse_err("1v # comment: echo x");
        assert!(err.contains("missing ':'"), "{err}");
    }

    #[test]
    fn test_unknown_token_rejected() {
        let err = parse_err("1x,2: echo x");
        assert!(err.contains("unrecognized pattern token `1x`"), "{err}");
    }

    #[test]
    fn test_empty_pattern_rejected() {
        let err = parse_err(": echo x");
        assert!(err.contains("empty pattern"), "{err}");
    }

    #[test]
    fn test_empty_element_rejected() {
        let err = parse_err("1v,,2: echo x");
        assert!(err.contains("empty pattern element"), "{err}");
    }

    #[test]
    fn test_zero_button_rejected() {
        let err = parse_err("0: echo x");
        assert!(err.contains("button numbers start at 1"), "{err}");
    }

    #[test]
    fn test_malformed_time_limit_rejected() {
        let err = parse_err("1,2 < fast: echo x");
        assert!(err.contains("malformed time limit `fast`"), "{err}");
        let err = parse_err("1,2 < -1: echo x");
        assert!(err.contains("malformed time limit"), "{err}");
    }

    #[test]
    fn test_duplicate_rule_rejected() {
        let err = parse_err("1v,2: A\n1v,2: A\n");
        assert!(err.contains("test.conf:2"), "{err}");
        assert!(err.contains("duplicate rule"), "{err}");
    }

    #[test]
    fn test_same_pattern_different_command_allowed() {
        let config = parse("1v,2: A\n1v,2: B\n");
        assert_eq!(config.rules.len(), 2);
    }

    #[test]
    fn test_device_line_bare_codes() {
        let config = parse("dev: /dev/input/event7 [256,257,258]");
        assert_eq!(config.devices.len(), 1);
        let dev = &config.devices[0];
        assert_eq!(dev.path, "/dev/input/event7");
        assert_eq!(dev.codes.len(), 3);
        assert_eq!(dev.codes[0], EventCodeSpec { event_type: ecodes::EV_KEY, code: 256, value: None });
        assert!(!dev.shared);
        assert!(!dev.codes[0].is_auto_release());
    }

    #[test]
    fn test_device_line_symbolic_codes() {
        let config = parse("dev: /dev/input/event3 [BTN_LEFT, BTN_RIGHT]");
        let dev = &config.devices[0];
        assert_eq!(dev.codes[0].code, 0x110);
        assert_eq!(dev.codes[1].code, 0x111);
    }

    #[test]
    fn test_device_line_value_triples() {
        let config = parse("dev: /dev/input/event3 [EV_REL/REL_WHEEL=1, EV_REL/REL_WHEEL=-1, 2/6=1]");
        let dev = &config.devices[0];
        assert_eq!(dev.codes[0], EventCodeSpec { event_type: 2, code: 8, value: Some(1) });
        assert_eq!(dev.codes[1].value, Some(-1));
        assert_eq!(dev.codes[2], EventCodeSpec { event_type: 2, code: 6, value: Some(1) });
        assert!(dev.codes[0].is_auto_release());
    }

    #[test]
    fn test_device_line_shared() {
        let config = parse("dev: /dev/input/event3 [BTN_LEFT] [shared]");
        assert!(config.devices[0].shared);
    }

    #[test]
    fn test_device_line_trailing_comment() {
        let config = parse("dev: /dev/input/event3 [BTN_LEFT] # the mouse");
        assert_eq!(config.devices[0].codes.len(), 1);
    }

    #[test]
    fn test_device_line_errors() {
        assert!(parse_err("dev: /dev/input/event3").contains("[code list]"));
        assert!(parse_err("dev: [256]").contains("missing device path"));
        assert!(parse_err("dev: /dev/x [256").contains("unterminated"));
        assert!(parse_err("dev: /dev/x []").contains("empty [code list]"));
        assert!(parse_err("dev: /dev/x [256] extra").contains("unexpected trailing"));
        assert!(parse_err("dev: /dev/x [EV_REL/REL_WHEEL]").contains("needs `=value`"));
        assert!(parse_err("dev: /dev/x [EV_BOGUS/8=1]").contains("unknown event type"));
        assert!(parse_err("dev: /dev/x [REL_NOPE]").contains("unknown event code"));
    }

    #[test]
    fn test_button_count_from_devices() {
        let config = parse("dev: /dev/a [256,257,258]\ndev: /dev/b [BTN_LEFT,BTN_RIGHT,BTN_MIDDLE]\n1v,5: X\n");
        assert_eq!(config.button_count(), 6);
    }

    #[test]
    fn test_button_count_from_rules_when_no_devices() {
        let config = parse("1v,5: X\n");
        assert_eq!(config.button_count(), 5);
    }

    #[test]
    fn test_dump_reparses_to_same_rules() {
        let text = "dev: /dev/input/event7 [256,257,258]\n\
                    dev: /dev/input/event3 [EV_REL/REL_WHEEL=1] [shared]\n\
                    1v,2: echo combo\n\
                    1,2,3 < 0.5: echo run\n\
                    1: echo tap\n\
                    2v,1^: echo cross\n";
        let first = parse(text);
        let second = parse(&first.dump());
        assert_eq!(first.devices, second.devices);
        assert_eq!(first.rules.len(), second.rules.len());
        for (a, b) in first.rules.iter().zip(&second.rules) {
            assert_eq!(a.sequence, b.sequence);
            assert_eq!(a.time_limit, b.time_limit);
            assert_eq!(a.command, b.command);
        }
    }
}
