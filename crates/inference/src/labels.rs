use std::sync::Arc;

/// Surface classes predicted by the detection model, in output order
pub const PLD_LABELS: [&str; 8] = [
    "Litter - high",
    "Litter - low",
    "Organic debris",
    "Other",
    "Sand",
    "Stones",
    "Vegetation",
    "Water",
];

/// Detection classes that are passed on to quantification
pub const PLD_LITTER_CLASSES: [usize; 2] = [0, 1];

/// Litter categories predicted by the quantification model, in output order
pub const PLQ_LABELS: [&str; 5] = [
    "Plastic fragment",
    "Plastic item",
    "Other artificial",
    "Natural",
    "Background",
];

/// Ordered class names shared between a model and its results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    names: Arc<[String]>,
}

impl LabelSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Name of `class_id`, or `"class <id>"` when the model emits more
    /// classes than configured
    pub fn name(&self, class_id: usize) -> String {
        self.names
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class {class_id}"))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_class_gets_generic_name() {
        let labels = LabelSet::new(["a", "b"]);
        assert_eq!(labels.name(1), "b");
        assert_eq!(labels.name(7), "class 7");
    }

    #[test]
    fn litter_classes_point_at_litter_labels() {
        for class in PLD_LITTER_CLASSES {
            assert!(PLD_LABELS[class].starts_with("Litter"));
        }
    }
}
