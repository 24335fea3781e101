use serde_json::{Value, json};

/// Static reference material shown alongside a prediction. This is display
/// copy only, not clinical guidance produced by the model.
#[derive(Debug, Clone, Copy)]
pub struct MedicalInfo {
    pub description: &'static str,
    pub urgency: &'static str,
}

const MEDICAL_INFO: [(&str, MedicalInfo); 4] = [
    (
        "glioma",
        MedicalInfo {
            description: "Gliomas are tumors that originate from glial cells in the brain or \
                          spinal cord. They can vary in aggressiveness from low-grade \
                          (slow-growing) to high-grade (fast-growing and invasive).",
            urgency: "High",
        },
    ),
    (
        "meningioma",
        MedicalInfo {
            description: "Meningiomas are typically benign tumors that arise from the meninges, \
                          the protective membranes surrounding the brain and spinal cord. Most \
                          grow slowly and may not cause symptoms for years.",
            urgency: "Medium",
        },
    ),
    (
        "notumor",
        MedicalInfo {
            description: "No evidence of brain tumor detected. The brain anatomy appears normal \
                          within the limits of this imaging study.",
            urgency: "Low",
        },
    ),
    (
        "pituitary",
        MedicalInfo {
            description: "Pituitary tumors develop in the pituitary gland, a small gland at the \
                          base of the brain that controls hormone production. They can be \
                          functioning (produce hormones) or non-functioning.",
            urgency: "Medium",
        },
    ),
];

pub fn lookup(label: &str) -> Option<&'static MedicalInfo> {
    MEDICAL_INFO
        .iter()
        .find(|(name, _)| *name == label)
        .map(|(_, info)| info)
}

/// JSON form used in the predict response; unknown labels map to `{}`.
pub fn lookup_json(label: &str) -> Value {
    lookup(label)
        .map(|info| {
            json!({
                "description": info.description,
                "urgency": info.urgency,
            })
        })
        .unwrap_or_else(|| json!({}))
}
