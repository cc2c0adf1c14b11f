// ============================================================
// Layer 4 — Note Parser
// ============================================================
// Turns free-text activity notes into fixed-schema Records.
//
// A typical log line looks like:
//
//   cot d T -15 70 sun headwind cool
//   │   │ │  │  │  │   │        └─ comfort label
//   │   │ │  │  │  │   └────────── condition
//   │   │ │  │  │  └────────────── condition
//   │   │ │  │  └───────────────── heart rate (> 50)
//   │   │ │  └──────────────────── temperature (<= 50, or "-15c")
//   │   │ └─────────────────────── lower-body code (upper case)
//   │   └───────────────────────── upper-body code (lower case)
//   └───────────────────────────── shirt fabric
//
// Parsing is a table of rule groups. Each group owns some
// fields and lists its rules in priority order; the first rule
// that matches wins and the rest of the group is skipped. A line
// mentioning both "poly" and "cot" therefore records only poly.
// Groups never interact, so their order in the table is free.
//
// Nothing here fails: a line no rule recognises yields the
// default record.

use anyhow::Result;
use regex::Regex;

use crate::domain::record::{ComfortLabel, Field, Record};

/// Numbers above this are heart rates, at or below it temperatures
pub const PLAUSIBILITY_THRESHOLD: i32 = 50;

// ─── Rule Table ───────────────────────────────────────────────────────────────

/// How a rule recognises its keyword in a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    /// Case-insensitive substring anywhere in the line
    Substring(&'static str),
    /// Case-sensitive whole token (tokens split on whitespace and commas)
    Token(&'static str),
}

/// Which "no …" / "not …" phrases switch a rule off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Negation {
    /// Never negated
    None,
    /// A negated mention of this rule's own keyword vetoes only this rule
    PerRule,
    /// A negated mention of any keyword in the group vetoes the whole group
    Group,
}

#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub matcher: Matcher,
    pub field:   Field,
    pub value:   i32,
}

impl Rule {
    const fn substring(keyword: &'static str, field: Field, value: i32) -> Self {
        Self { matcher: Matcher::Substring(keyword), field, value }
    }

    const fn token(code: &'static str, field: Field) -> Self {
        Self { matcher: Matcher::Token(code), field, value: 1 }
    }

    fn keyword(&self) -> &'static str {
        match self.matcher {
            Matcher::Substring(k) | Matcher::Token(k) => k,
        }
    }
}

/// An ordered, first-match-wins list of rules.
#[derive(Debug, Clone)]
pub struct RuleGroup {
    pub name:     &'static str,
    pub negation: Negation,
    pub rules:    Vec<Rule>,
}

/// The full heuristic table, in documented priority order.
pub fn default_rules() -> Vec<RuleGroup> {
    use Field::*;
    vec![
        RuleGroup {
            name: "garment",
            negation: Negation::None,
            rules: vec![
                Rule::substring("dress", TDress, 1),
                Rule::substring("poly",  TPoly,  1),
                Rule::substring("cot",   TCot,   1),
            ],
        },
        RuleGroup {
            name: "upper",
            negation: Negation::None,
            rules: vec![
                Rule::token("s", Sleeves),
                Rule::token("l", JLight),
                Rule::token("f", JFleece),
                Rule::token("d", JDown),
            ],
        },
        RuleGroup {
            name: "lower",
            negation: Negation::None,
            rules: vec![
                Rule::token("S", Shorts),
                Rule::token("L", PThin),
                Rule::token("T", PThick),
                Rule::token("F", PFleece),
                Rule::token("D", PDown),
            ],
        },
        RuleGroup {
            name: "sun",
            negation: Negation::Group,
            rules: vec![Rule::substring("sun", Sun, 1)],
        },
        RuleGroup {
            name: "headwind",
            negation: Negation::Group,
            rules: vec![Rule::substring("head", Headwind, 1)],
        },
        RuleGroup {
            name: "fatigue",
            negation: Negation::Group,
            rules: vec![Rule::substring("fatigue", Fatigued, 1)],
        },
        RuleGroup {
            name: "rain",
            negation: Negation::Group,
            rules: vec![
                Rule::substring("heavy rain",  Rain, 3),
                Rule::substring("medium rain", Rain, 2),
                Rule::substring("light rain",  Rain, 1),
                Rule::substring("rain",        Rain, 1),
            ],
        },
        RuleGroup {
            name: "snow",
            negation: Negation::Group,
            rules: vec![
                Rule::substring("heavy snow",  Snow, 3),
                Rule::substring("medium snow", Snow, 2),
                Rule::substring("light snow",  Snow, 1),
                Rule::substring("snow",        Snow, 1),
            ],
        },
        RuleGroup {
            name: "feels",
            negation: Negation::PerRule,
            rules: vec![
                Rule::substring("cold", Feels, ComfortLabel::Cold.code()),
                Rule::substring("cool", Feels, ComfortLabel::Cool.code()),
                Rule::substring("warm", Feels, ComfortLabel::Warm.code()),
                Rule::substring("hot",  Feels, ComfortLabel::Hot.code()),
            ],
        },
    ]
}

// ─── Line View ────────────────────────────────────────────────────────────────
/// A line pre-split into the forms the matchers need.
struct Line<'a> {
    lower:  String,
    tokens: Vec<&'a str>,
}

impl<'a> Line<'a> {
    fn new(raw: &'a str) -> Self {
        let tokens = raw
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
            .collect();
        Self { lower: raw.to_lowercase(), tokens }
    }

    fn matches(&self, matcher: Matcher) -> bool {
        match matcher {
            Matcher::Substring(k) => self.lower.contains(k),
            Matcher::Token(code)  => self.tokens.iter().any(|t| *t == code),
        }
    }

    /// True when some mention of `keyword` is directly preceded by "no" or "not"
    fn is_negated(&self, keyword: &str) -> bool {
        self.lower.match_indices(keyword).any(|(idx, _)| {
            let before = self.lower[..idx].trim_end();
            let prev_word = before
                .rsplit(|c: char| c.is_whitespace() || c == ',')
                .next()
                .unwrap_or("");
            // the keyword must start a fresh word after the negation
            before.len() < idx && (prev_word == "no" || prev_word == "not")
        })
    }
}

// ─── NoteParser ───────────────────────────────────────────────────────────────
pub struct NoteParser {
    groups:         Vec<RuleGroup>,
    temp_with_unit: Regex,
    bare_integer:   Regex,
}

impl NoteParser {
    /// Build a parser with the default rule table
    pub fn new() -> Result<Self> {
        Self::with_rules(default_rules())
    }

    pub fn with_rules(groups: Vec<RuleGroup>) -> Result<Self> {
        // Both skip fractional parts like ".25". A unit-suffixed value
        // may sit right after a code ("T-17c"); a bare integer may
        // not, so "-" never binds to a preceding word.
        let temp_with_unit = Regex::new(r"(?:^|[^\d.])(-?\d+)[cC]\b")?;
        let bare_integer   = Regex::new(r"(?:^|[^\w.-])(-?\d+)\b")?;
        Ok(Self { groups, temp_with_unit, bare_integer })
    }

    /// Parse a block of notes: one Record per non-blank line.
    pub fn parse_notes(&self, notes: &str) -> Vec<Record> {
        notes
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| self.parse_line(l))
            .collect()
    }

    /// Parse a single line. Unrecognised content leaves defaults in place.
    pub fn parse_line(&self, raw: &str) -> Record {
        let mut record = Record::default();
        let line = Line::new(raw);

        for group in &self.groups {
            if let Some(rule) = self.first_match(group, &line) {
                tracing::trace!("{}: {:?} = {}", group.name, rule.field, rule.value);
                record.set(rule.field, rule.value);
            }
        }

        if let Some(temp) = self.extract_temperature(raw) {
            record.temp = temp;
        }
        if let Some(hr) = self.extract_heart_rate(raw) {
            record.hr = hr;
        }

        tracing::trace!("parsed {:?} -> {:?}", raw, record);
        record
    }

    fn first_match<'g>(&self, group: &'g RuleGroup, line: &Line<'_>) -> Option<&'g Rule> {
        if group.negation == Negation::Group
            && group.rules.iter().any(|r| line.is_negated(r.keyword()))
        {
            return None;
        }
        group.rules.iter().find(|rule| {
            line.matches(rule.matcher)
                && !(group.negation == Negation::PerRule && line.is_negated(rule.keyword()))
        })
    }

    /// Prefer a number with a unit suffix, else the first bare integer <= 50.
    pub fn extract_temperature(&self, line: &str) -> Option<i32> {
        if let Some(v) = self
            .temp_with_unit
            .captures_iter(line)
            .find_map(|c| c[1].parse::<i32>().ok())
        {
            return Some(v);
        }
        self.bare_integers(line)
            .into_iter()
            .find(|&n| n <= PLAUSIBILITY_THRESHOLD)
    }

    /// The first bare integer above the plausibility threshold.
    pub fn extract_heart_rate(&self, line: &str) -> Option<i32> {
        self.bare_integers(line)
            .into_iter()
            .find(|&n| n > PLAUSIBILITY_THRESHOLD)
    }

    fn bare_integers(&self, line: &str) -> Vec<i32> {
        self.bare_integer
            .captures_iter(line)
            .filter_map(|c| c[1].parse::<i32>().ok())
            .collect()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Record {
        NoteParser::new().unwrap().parse_line(line)
    }

    #[test]
    fn test_reference_line() {
        let r = parse("cot T -17 110 sun cool");
        assert_eq!(r.t_cot, 1);
        assert_eq!(r.p_thick, 1);
        assert_eq!(r.temp, -17);
        assert_eq!(r.hr, 110);
        assert_eq!(r.sun, 1);
        assert_eq!(r.feels, 1);
        // nothing else was mentioned
        assert_eq!(r.t_poly + r.t_dress + r.sleeves + r.headwind + r.rain + r.snow, 0);
    }

    #[test]
    fn test_no_garment_keyword_leaves_indicators_zero() {
        let r = parse("T -5 90 sun warm");
        assert_eq!(r.t_dress + r.t_poly + r.t_cot, 0);
        assert_eq!(r.p_thick, 1);
    }

    #[test]
    fn test_first_garment_in_priority_order_wins() {
        // poly outranks cot regardless of position in the line
        let r = parse("cot poly L -2 95 cool");
        assert_eq!(r.t_poly, 1);
        assert_eq!(r.t_cot, 0);
        // dress outranks both
        let r = parse("poly dress -2 95 cool");
        assert_eq!(r.t_dress, 1);
        assert_eq!(r.t_poly, 0);
    }

    #[test]
    fn test_modifier_case_separates_upper_and_lower() {
        let r = parse("cot d T -15 70 sun cool");
        assert_eq!(r.j_down, 1);
        assert_eq!(r.p_down, 0);
        assert_eq!(r.p_thick, 1);
        assert_eq!(r.sleeves, 0);
    }

    #[test]
    fn test_modifiers_are_token_bounded() {
        // "s" inside "sun" or "S" inside "Sunny" must not count
        let r = parse("poly -3 100 sun Sunny cool");
        assert_eq!(r.sleeves, 0);
        assert_eq!(r.shorts, 0);
        // commas bound tokens too
        let r = parse("cot L, -10c, 110, no sun, light snow, cool");
        assert_eq!(r.p_thin, 1);
    }

    #[test]
    fn test_one_modifier_per_body_half() {
        // s outranks f in the upper group; S outranks F in the lower group
        let r = parse("poly f s F S 10 80 warm");
        assert_eq!(r.sleeves, 1);
        assert_eq!(r.j_fleece, 0);
        assert_eq!(r.shorts, 1);
        assert_eq!(r.p_fleece, 0);
    }

    #[test]
    fn test_temperature_with_unit_preferred() {
        let r = parse("polo d F, 1c, 70, no sun, .25 rain, cool");
        assert_eq!(r.temp, 1);
        assert_eq!(r.hr, 70);
        assert_eq!(r.sun, 0);
        assert_eq!(r.rain, 1);
    }

    #[test]
    fn test_unit_temperature_glued_to_code() {
        let r = parse("cot T-17c 110 cool");
        assert_eq!(r.temp, -17);
        assert_eq!(r.hr, 110);
        // the code itself is not a separate token any more
        assert_eq!(r.p_thick, 0);
        // without the unit a glued number is ignored
        let r = parse("cot T-17 110 cool");
        assert_eq!(r.temp, 0);
        // fractions never count
        assert_eq!(parse("cot .5c 3 80 cool").temp, 3);
    }

    #[test]
    fn test_temperature_fallback_and_threshold() {
        let r = parse("poly L -6 110, medium rain, sun cool");
        assert_eq!(r.temp, -6);
        assert_eq!(r.hr, 110);
        assert_eq!(r.rain, 2);
        // 51 is a heart rate, not a temperature
        let r = parse("cot 51 cool");
        assert_eq!(r.temp, 0);
        assert_eq!(r.hr, 51);
        // 50 is still a temperature
        let r = parse("cot 50 cool");
        assert_eq!(r.temp, 50);
        assert_eq!(r.hr, 0);
    }

    #[test]
    fn test_negative_number_is_never_heart_rate() {
        let r = parse("cot -60 cool");
        assert_eq!(r.hr, 0);
        assert_eq!(r.temp, -60);
    }

    #[test]
    fn test_sun_negation_vetoes_later_mentions() {
        let r = parse("poly d T -16 110 no sun cool sun warm");
        assert_eq!(r.sun, 0);
        // cool outranks warm
        assert_eq!(r.feels, 1);
    }

    #[test]
    fn test_rain_and_snow_negation() {
        assert_eq!(parse("cot 5 80 no rain cool").rain, 0);
        assert_eq!(parse("cot 5 80 not heavy snow cool").snow, 0);
        assert_eq!(parse("cot 5 80 heavy snow cool").snow, 3);
        assert_eq!(parse("cot 5 80 snow cool").snow, 1);
    }

    #[test]
    fn test_feels_negation_is_per_label() {
        let r = parse("cot 5 80 not cold, warm");
        assert_eq!(r.feels, 2);
        let r = parse("cot 5 80 cold");
        assert_eq!(r.feels, 0);
        let r = parse("cot 30 140 hot");
        assert_eq!(r.feels, 3);
    }

    #[test]
    fn test_negation_needs_word_boundary() {
        // "piano sun" is not a negation
        let r = parse("cot 5 80 piano sun");
        assert_eq!(r.sun, 1);
    }

    #[test]
    fn test_conditions() {
        let r = parse("cot T -17 70 sun headwind fatigued cool");
        assert_eq!(r.headwind, 1);
        assert_eq!(r.fatigued, 1);
    }

    #[test]
    fn test_blank_lines_skipped_and_labels_valid() {
        let notes = "cot T -17 110 sun cool\n\n   \npoly L -6 110 warm\ngarbage line\n";
        let records = NoteParser::new().unwrap().parse_notes(notes);
        assert_eq!(records.len(), 3);
        for r in &records {
            assert!((0..=3).contains(&r.feels));
            assert_eq!(r.values().len(), Field::ALL.len());
        }
        // the garbage line falls back to defaults
        assert_eq!(records[2], Record::default());
    }

    #[test]
    fn test_parsing_is_deterministic() {
        let p = NoteParser::new().unwrap();
        let line = "poly d T -16 110 no sun cool sun warm";
        assert_eq!(p.parse_line(line), p.parse_line(line));
    }
}
