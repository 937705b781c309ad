//! Conversion of the 43-class CORINE labels to the 19-class nomenclature.
//!
//! Several of the original classes have no counterpart; a patch carrying only
//! such labels has no 19-class labels at all.

/// The 19 classes, in nomenclature order.
pub const NINETEEN_CLASS_LABELS: [&str; 19] = [
    "Urban fabric",
    "Industrial or commercial units",
    "Arable land",
    "Permanent crops",
    "Pastures",
    "Complex cultivation patterns",
    "Land principally occupied by agriculture, with significant areas of natural vegetation",
    "Agro-forestry areas",
    "Broad-leaved forest",
    "Coniferous forest",
    "Mixed forest",
    "Natural grassland and sparsely vegetated areas",
    "Moors, heathland and sclerophyllous vegetation",
    "Transitional woodland, shrub",
    "Beaches, dunes, sands",
    "Inland wetlands",
    "Coastal wetlands",
    "Inland waters",
    "Marine waters",
];

/// Index into [`NINETEEN_CLASS_LABELS`] of a 43-class label.
///
/// `None` for classes that were dropped and for names outside the 43-class
/// nomenclature.
#[must_use]
pub fn nineteen_class_index(label: &str) -> Option<usize> {
    let index = match label.trim() {
        "Continuous urban fabric" | "Discontinuous urban fabric" => 0,
        "Industrial or commercial units" => 1,
        "Non-irrigated arable land" | "Permanently irrigated land" | "Rice fields" => 2,
        "Vineyards"
        | "Fruit trees and berry plantations"
        | "Olive groves"
        | "Annual crops associated with permanent crops" => 3,
        "Pastures" => 4,
        "Complex cultivation patterns" => 5,
        "Land principally occupied by agriculture, with significant areas of natural vegetation" => 6,
        "Agro-forestry areas" => 7,
        "Broad-leaved forest" => 8,
        "Coniferous forest" => 9,
        "Mixed forest" => 10,
        "Natural grassland" | "Sparsely vegetated areas" => 11,
        "Moors and heathland" | "Sclerophyllous vegetation" => 12,
        "Transitional woodland/shrub" => 13,
        "Beaches, dunes, sands" => 14,
        "Inland marshes" | "Peatbogs" => 15,
        "Salt marshes" | "Salines" => 16,
        "Water courses" | "Water bodies" => 17,
        "Coastal lagoons" | "Estuaries" | "Sea and ocean" => 18,
        _ => return None,
    };
    Some(index)
}

/// Converts 43-class labels to the 19-class nomenclature.
///
/// The result is free of duplicates and ordered like
/// [`NINETEEN_CLASS_LABELS`]. It is empty when no label has a counterpart.
#[must_use]
pub fn to_nineteen_class(labels: &[String]) -> Vec<String> {
    let mut present = [false; NINETEEN_CLASS_LABELS.len()];
    for label in labels {
        if let Some(index) = nineteen_class_index(label) {
            present[index] = true;
        }
    }
    NINETEEN_CLASS_LABELS
        .iter()
        .zip(present)
        .filter(|(_, present)| *present)
        .map(|(label, _)| (*label).to_string())
        .collect()
}

/// Returns `true` if at least one label has a 19-class counterpart.
#[must_use]
pub fn has_nineteen_class_labels(labels: &[String]) -> bool {
    labels
        .iter()
        .any(|label| nineteen_class_index(label).is_some())
}
