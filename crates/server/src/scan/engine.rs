//! Similarity engine
//!
//! The matching algorithm is a pluggable capability behind the
//! `SimilarityEngine` trait; `NameSimilarity` is the default heuristic.
//! Blocking keys keep the comparison quadratic only within a block.

use doublons_common::models::Student;
use uuid::Uuid;

/// A candidate cluster produced by the engine, before registry and
/// ignore-list filtering
#[derive(Debug, Clone)]
pub struct CandidateGroup {
    pub member_ids: Vec<Uuid>,
    pub score: f32,
}

/// Pluggable pairwise/blocked comparison over the student population
pub trait SimilarityEngine: Send + Sync {
    /// Partition the population into comparison blocks. Block order and
    /// within-block order must be deterministic so a paused scan can
    /// resume from a record index.
    fn blocks(&self, students: &[Student]) -> Vec<Vec<Student>>;

    /// Compare records within one block and emit candidate groups
    fn scan_block(&self, block: &[Student]) -> Vec<CandidateGroup>;
}

/// Default engine: normalized name comparison with exact strong
/// signals (birth date, INE, email)
pub struct NameSimilarity {
    /// Minimum pairwise score (0-100) for two records to cluster
    pub threshold: f32,
    /// Upper bound on block size; oversized buckets are chunked so
    /// checkpoints stay frequent even on degenerate key distributions
    pub block_size: usize,
}

impl NameSimilarity {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            block_size: 200,
        }
    }

    pub fn with_block_size(mut self, block_size: u64) -> Self {
        self.block_size = (block_size as usize).max(1);
        self
    }

    fn pair_score(&self, a: &Student, b: &Student) -> f32 {
        let mut score = 0.0f32;
        let mut weight = 0.0f32;

        score += 35.0 * name_similarity(&a.nom, &b.nom);
        weight += 35.0;
        score += 25.0 * name_similarity(&a.prenom, &b.prenom);
        weight += 25.0;

        if let (Some(da), Some(db)) = (a.date_naissance, b.date_naissance) {
            score += if da == db { 20.0 } else { 0.0 };
            weight += 20.0;
        }
        if let (Some(ia), Some(ib)) = (a.ine.as_deref(), b.ine.as_deref()) {
            score += if normalize(ia) == normalize(ib) { 10.0 } else { 0.0 };
            weight += 10.0;
        }
        if let (Some(ea), Some(eb)) = (a.email.as_deref(), b.email.as_deref()) {
            score += if ea.eq_ignore_ascii_case(eb) { 10.0 } else { 0.0 };
            weight += 10.0;
        }

        if weight == 0.0 {
            return 0.0;
        }
        (score / weight * 100.0).clamp(0.0, 100.0)
    }
}

impl SimilarityEngine for NameSimilarity {
    fn blocks(&self, students: &[Student]) -> Vec<Vec<Student>> {
        use std::collections::BTreeMap;

        let mut buckets: BTreeMap<String, Vec<Student>> = BTreeMap::new();
        for student in students {
            let key = normalize(&student.nom)
                .chars()
                .next()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "~".to_string());
            buckets.entry(key).or_default().push(student.clone());
        }
        for block in buckets.values_mut() {
            block.sort_by_key(|s| s.id);
        }
        buckets
            .into_values()
            .flat_map(|bucket| {
                bucket
                    .chunks(self.block_size)
                    .map(|chunk| chunk.to_vec())
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    fn scan_block(&self, block: &[Student]) -> Vec<CandidateGroup> {
        // Union-find over records whose pairwise score clears the threshold
        let n = block.len();
        let mut parent: Vec<usize> = (0..n).collect();
        let mut pair_scores: Vec<Vec<f32>> = vec![Vec::new(); n];

        fn find(parent: &mut Vec<usize>, i: usize) -> usize {
            let mut root = i;
            while parent[root] != root {
                root = parent[root];
            }
            let mut cur = i;
            while parent[cur] != root {
                let next = parent[cur];
                parent[cur] = root;
                cur = next;
            }
            root
        }

        for i in 0..n {
            for j in (i + 1)..n {
                let score = self.pair_score(&block[i], &block[j]);
                if score >= self.threshold {
                    let ri = find(&mut parent, i);
                    let rj = find(&mut parent, j);
                    if ri != rj {
                        parent[ri] = rj;
                    }
                    pair_scores[i].push(score);
                    pair_scores[j].push(score);
                }
            }
        }

        let mut clusters: std::collections::HashMap<usize, (Vec<Uuid>, Vec<f32>)> =
            std::collections::HashMap::new();
        for i in 0..n {
            let root = find(&mut parent, i);
            let entry = clusters.entry(root).or_default();
            entry.0.push(block[i].id);
            entry.1.extend(pair_scores[i].iter().copied());
        }

        let mut groups: Vec<CandidateGroup> = clusters
            .into_values()
            .filter(|(ids, _)| ids.len() >= 2)
            .map(|(member_ids, scores)| {
                let score = if scores.is_empty() {
                    0.0
                } else {
                    scores.iter().sum::<f32>() / scores.len() as f32
                };
                CandidateGroup {
                    member_ids,
                    score: score.clamp(0.0, 100.0),
                }
            })
            .collect();
        groups.sort_by_key(|g| g.member_ids.iter().min().copied());
        groups
    }
}

/// Lowercase, strip the usual French diacritics, keep alphanumerics
fn normalize(s: &str) -> String {
    s.chars()
        .filter_map(|c| {
            let folded = match c {
                'à' | 'â' | 'ä' | 'á' => 'a',
                'é' | 'è' | 'ê' | 'ë' => 'e',
                'î' | 'ï' | 'í' => 'i',
                'ô' | 'ö' | 'ó' => 'o',
                'ù' | 'û' | 'ü' | 'ú' => 'u',
                'ç' => 'c',
                'À' | 'Â' | 'Ä' | 'Á' => 'a',
                'É' | 'È' | 'Ê' | 'Ë' => 'e',
                'Î' | 'Ï' | 'Í' => 'i',
                'Ô' | 'Ö' | 'Ó' => 'o',
                'Ù' | 'Û' | 'Ü' | 'Ú' => 'u',
                'Ç' => 'c',
                other => other,
            };
            let lower = folded.to_ascii_lowercase();
            if lower.is_ascii_alphanumeric() || lower == ' ' {
                Some(lower)
            } else {
                None
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Levenshtein ratio in [0, 1] over normalized strings
fn name_similarity(a: &str, b: &str) -> f32 {
    let a = normalize(a);
    let b = normalize(b);
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    let max_len = a.chars().count().max(b.chars().count());
    let dist = levenshtein(&a, &b);
    1.0 - (dist as f32 / max_len as f32)
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        cur[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            cur[j + 1] = (prev[j + 1] + 1).min(cur[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn student(nom: &str, prenom: &str) -> Student {
        Student::new(nom, prenom)
    }

    #[test]
    fn test_normalize_folds_accents_and_case() {
        assert_eq!(normalize("Rakotoarisoa"), "rakotoarisoa");
        assert_eq!(normalize("RANDRIANAMPOINIMERINA"), "randrianampoinimerina");
        assert_eq!(normalize("Hélène-Marie"), "helenemarie");
        assert_eq!(normalize("  Jean   Claude "), "jean claude");
    }

    #[test]
    fn test_levenshtein_basics() {
        assert_eq!(levenshtein("", ""), 0);
        assert_eq!(levenshtein("abc", "abc"), 0);
        assert_eq!(levenshtein("abc", "abd"), 1);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
    }

    #[test]
    fn test_identical_students_cluster() {
        let engine = NameSimilarity::new(70.0);
        let mut a = student("Rakoto", "Jean");
        let mut b = student("Rakoto", "Jean");
        let dob = NaiveDate::from_ymd_opt(2001, 9, 14).unwrap();
        a.date_naissance = Some(dob);
        b.date_naissance = Some(dob);

        let groups = engine.scan_block(&[a.clone(), b.clone()]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].member_ids.len(), 2);
        assert!(groups[0].score > 90.0);
    }

    #[test]
    fn test_dissimilar_students_do_not_cluster() {
        let engine = NameSimilarity::new(70.0);
        let a = student("Rakoto", "Jean");
        let b = student("Andrianina", "Miora");

        let groups = engine.scan_block(&[a, b]);
        assert!(groups.is_empty());
    }

    #[test]
    fn test_accented_variant_clusters() {
        let engine = NameSimilarity::new(70.0);
        let mut a = student("Bénitez", "Hélène");
        let mut b = student("Benitez", "Helene");
        let dob = NaiveDate::from_ymd_opt(1999, 2, 3).unwrap();
        a.date_naissance = Some(dob);
        b.date_naissance = Some(dob);

        let groups = engine.scan_block(&[a, b]);
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn test_blocks_partition_by_surname_initial() {
        let engine = NameSimilarity::new(70.0);
        let students = vec![
            student("Rakoto", "Jean"),
            student("Andria", "Feno"),
            student("Rabe", "Noro"),
        ];
        let blocks = engine.blocks(&students);
        // "a" block and "r" block, deterministic order
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].len(), 1);
        assert_eq!(blocks[1].len(), 2);
    }

    #[test]
    fn test_blocks_are_deterministic() {
        let engine = NameSimilarity::new(70.0);
        let students = vec![
            student("Rakoto", "Jean"),
            student("Rabe", "Noro"),
            student("Andria", "Feno"),
        ];
        let first = engine.blocks(&students);
        let second = engine.blocks(&students);
        let flat =
            |blocks: &[Vec<Student>]| -> Vec<Uuid> { blocks.iter().flatten().map(|s| s.id).collect() };
        assert_eq!(flat(&first), flat(&second));
    }

    #[test]
    fn test_transitive_clustering() {
        // A~B and B~C pull A, B, C into one group even if A-C is weaker
        let engine = NameSimilarity::new(70.0);
        let dob = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        let mut a = student("Rasolofo", "Tiana");
        let mut b = student("Rasolofo", "Tiana");
        let mut c = student("Rasolofoa", "Tiana");
        a.date_naissance = Some(dob);
        b.date_naissance = Some(dob);
        c.date_naissance = Some(dob);

        let groups = engine.scan_block(&[a, b, c]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].member_ids.len(), 3);
    }
}
