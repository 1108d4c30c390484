use super::error::IndexOutOfRange;

// ---------------------------------------------------------------------------
// DiseaseRecord – static reference entry per classifier output
// ---------------------------------------------------------------------------

/// Display name, cause and remedy for one disease class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiseaseRecord {
    /// English label used as the primary name.
    pub label: &'static str,
    /// Indonesian name shown alongside the label.
    pub local_name: &'static str,
    pub cause: &'static str,
    pub solution: &'static str,
}

/// Number of classes the classifier must emit.
pub const CLASS_COUNT: usize = 5;

/// Ordered exactly like the classifier's training labels.
pub static DISEASES: [DiseaseRecord; CLASS_COUNT] = [
    DiseaseRecord {
        label: "Bacteria wilt",
        local_name: "Layu Bakteri",
        cause: "Disebabkan oleh bakteri Ralstonia solanacearum yang menyerang jaringan pembuluh tanaman.",
        solution: "Gunakan bibit sehat, rotasi tanaman, dan buang tanaman yang terinfeksi.",
    },
    DiseaseRecord {
        label: "Early blight",
        local_name: "Hawar Kering",
        cause: "Disebabkan oleh jamur Alternaria solani yang menyerang daun dan batang.",
        solution: "Gunakan fungisida, buang daun terinfeksi, dan lakukan rotasi tanaman.",
    },
    DiseaseRecord {
        label: "Late blight",
        local_name: "Hawar Daun",
        cause: "Disebabkan oleh jamur Phytophthora infestans yang menyerang daun, batang, dan umbi.",
        solution: "Gunakan fungisida sistemik, tanam varietas tahan, dan hindari kelembapan berlebih.",
    },
    DiseaseRecord {
        label: "Nematode",
        local_name: "Nematoda",
        cause: "Disebabkan oleh nematoda Globodera spp. yang menyerang akar kentang.",
        solution: "Gunakan varietas tahan, lakukan rotasi tanaman, dan solarisasi tanah.",
    },
    DiseaseRecord {
        label: "Virus PVY",
        local_name: "Virus PVY",
        cause: "Disebabkan oleh Potato virus Y yang ditularkan oleh kutu daun.",
        solution: "Gunakan bibit bebas virus, kendalikan kutu daun, dan cabut tanaman terinfeksi.",
    },
];

/// Look up the record for a class index. Never falls back to a default.
pub fn resolve(index: usize) -> Result<&'static DiseaseRecord, IndexOutOfRange> {
    DISEASES.get(index).ok_or(IndexOutOfRange {
        index,
        len: CLASS_COUNT,
    })
}

// ---------------------------------------------------------------------------
// DetectionResult – what the user sees after a successful detection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    pub class_index: usize,
    pub label: &'static str,
    pub local_name: &'static str,
    pub cause: &'static str,
    pub solution: &'static str,
    /// Raw score of the winning class, not renormalized.
    pub confidence: f32,
}

impl DetectionResult {
    /// Join a winning class index and its score with the disease table.
    pub fn from_prediction(class_index: usize, confidence: f32) -> Result<Self, IndexOutOfRange> {
        let record = resolve(class_index)?;
        Ok(Self {
            class_index,
            label: record.label,
            local_name: record.local_name,
            cause: record.cause,
            solution: record.solution,
            confidence,
        })
    }

    /// Confidence as a percentage string for display, e.g. `"90.0%"`.
    pub fn confidence_percent(&self) -> String {
        format!("{:.1}%", self.confidence * 100.0)
    }
}
