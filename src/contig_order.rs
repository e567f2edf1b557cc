use rustc_hash::FxHashSet;
use std::cmp::Ordering;

/// First run of ASCII digits in `name`
fn first_digit_run(name: &str) -> Option<&str> {
    let start = name.find(|c: char| c.is_ascii_digit())?;
    let rest = &name[start..];
    let len = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    Some(&rest[..len])
}

/// Sort key of a contig name: the first run of digits it contains, compared numerically.
///
/// The digits are kept as a string without leading zeros so arbitrarily long runs compare
/// correctly (a longer run is a larger number).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContigKey {
    number: Option<String>,
}

impl ContigKey {
    pub fn new(name: &str) -> Self {
        let number = first_digit_run(name).map(|digits| {
            let trimmed = digits.trim_start_matches('0');
            if trimmed.is_empty() {
                "0".to_string()
            } else {
                trimmed.to_string()
            }
        });
        ContigKey { number }
    }

    pub fn is_numbered(&self) -> bool {
        self.number.is_some()
    }

    fn cmp_number(&self, other: &Self) -> Ordering {
        match (&self.number, &other.number) {
            (Some(a), Some(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

/// Order contig names for output.
///
/// Names with a digit run come first, by that number ascending and then by natural order of
/// the whole name. Names without digits follow in the order they were first seen. Duplicate
/// names are dropped.
pub fn order_contigs<'a, I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = FxHashSet::default();
    let mut keyed: Vec<(ContigKey, usize, &str)> = names
        .into_iter()
        .filter(|name| seen.insert(*name))
        .enumerate()
        .map(|(encounter, name)| (ContigKey::new(name), encounter, name))
        .collect();

    keyed.sort_by(|(key_a, encounter_a, name_a), (key_b, encounter_b, name_b)| {
        key_a.cmp_number(key_b).then_with(|| {
            if key_a.is_numbered() {
                natord::compare(name_a, name_b)
            } else {
                encounter_a.cmp(encounter_b)
            }
        })
    });

    keyed
        .into_iter()
        .map(|(_, _, name)| name.to_string())
        .collect()
}
