//! Field-level comparison of observed and desired objects.

use crate::nsx::Tag;

/// Tag sets are equal regardless of order; duplicates count.
pub fn equal_tags(a: &[Tag], b: &[Tag]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a: Vec<&Tag> = a.iter().collect();
    let mut b: Vec<&Tag> = b.iter().collect();
    a.sort();
    b.sort();
    a == b
}

/// Names of the fields that differ between the observed and the desired object.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FieldDiff {
    fields: Vec<&'static str>,
}

impl FieldDiff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Positional comparison; for lists this means order matters.
    pub fn field<T: PartialEq + ?Sized>(
        mut self,
        name: &'static str,
        current: &T,
        desired: &T,
    ) -> Self {
        if current != desired {
            self.fields.push(name);
        }
        self
    }

    /// Order-insensitive tag comparison.
    pub fn tags(mut self, current: &[Tag], desired: &[Tag]) -> Self {
        if !equal_tags(current, desired) {
            self.fields.push("tags");
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[&'static str] {
        &self.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> Vec<Tag> {
        pairs.iter().map(|(s, t)| Tag::new(*s, *t)).collect()
    }

    #[test]
    fn test_tag_order_does_not_matter() {
        let a = tags(&[("owner", "x"), ("cluster", "y")]);
        let b = tags(&[("cluster", "y"), ("owner", "x")]);
        assert!(equal_tags(&a, &b));
    }

    #[test]
    fn test_tag_multiset_semantics() {
        let a = tags(&[("owner", "x"), ("owner", "x")]);
        let b = tags(&[("owner", "x"), ("cluster", "y")]);
        assert!(!equal_tags(&a, &b));
        assert!(!equal_tags(&a, &a[..1]));
        assert!(equal_tags(&[], &[]));
    }

    #[test]
    fn test_field_diff_collects_names() {
        let dns_a = vec!["1.1.1.1".to_string(), "8.8.8.8".to_string()];
        let dns_b = vec!["8.8.8.8".to_string(), "1.1.1.1".to_string()];
        let diff = FieldDiff::new()
            .field("display_name", "a", "a")
            .field("dns_nameservers", &dns_a, &dns_b)
            .tags(&tags(&[("a", "b"), ("c", "d")]), &tags(&[("c", "d"), ("a", "b")]));
        assert_eq!(diff.fields(), &["dns_nameservers"]);
        assert!(!diff.is_empty());

        assert!(FieldDiff::new().field("lease_time", &7200, &7200).is_empty());
    }
}
