//! Hint label strings: short, unique, and visually scattered.

/// Enumerate `count` label strings over `alphabet`, breadth-first from the
/// empty seed so shorter strings are exhausted before longer ones. The result
/// is sorted and then each string is character-reversed, which scatters
/// labels that share a prefix instead of clustering them on the page.
pub fn generate(alphabet: &str, count: usize) -> Vec<String> {
    let chars: Vec<char> = alphabet.chars().collect();
    let mut hints: Vec<String> = vec![String::new()];
    let mut offset = 0;
    while hints.len() - offset < count || hints.len() == 1 {
        let seed = hints[offset].clone();
        offset += 1;
        for ch in &chars {
            hints.push(format!("{}{}", ch, seed));
        }
    }
    let mut hints: Vec<String> = hints[offset..offset + count].to_vec();
    hints.sort();
    hints.iter().map(|s| s.chars().rev().collect()).collect()
}
