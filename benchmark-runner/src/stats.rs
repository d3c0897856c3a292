use std::fmt;

/// The samples of one benchmark, in nanoseconds per run.
#[derive(Debug)]
pub struct BenchStats {
    variant: String,
    name: String,
    threads: usize,
    samples: Vec<u64>,
}

impl BenchStats {
    pub fn new(variant: &str, name: &str, threads: usize, samples: Vec<u64>) -> Self {
        Self {
            variant: variant.to_string(),
            name: name.to_string(),
            threads,
            samples,
        }
    }

    pub fn variant(&self) -> &str {
        &self.variant
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn samples(&self) -> &[u64] {
        &self.samples
    }

    pub fn mean(&self) -> u64 {
        if self.samples.is_empty() {
            return 0;
        }
        self.samples.iter().sum::<u64>() / self.samples.len() as u64
    }

    pub fn variance(&self) -> u64 {
        if self.samples.is_empty() {
            return 0;
        }
        let avg = self.mean();
        self.samples
            .iter()
            .map(|&s| s.abs_diff(avg).pow(2))
            .sum::<u64>()
            / self.samples.len() as u64
    }
}

impl fmt::Display for BenchStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}::{}::{} ................  {} ns/iter (+/- {})",
            self.variant,
            self.name,
            self.threads,
            fmt_thousands_sep(self.mean()),
            fmt_thousands_sep(self.variance())
        )
    }
}

pub fn fmt_thousands_sep(mut n: u64) -> String {
    let sep = ',';
    let mut output = String::new();
    let mut trailing = false;
    for &pow in &[18, 15, 12, 9, 6, 3, 0] {
        let base = 10u64.pow(pow);
        if pow == 0 || trailing || n / base != 0 {
            if !trailing {
                output.push_str(&(n / base).to_string());
            } else {
                output.push_str(&format!("{:03}", n / base));
            }
            if pow != 0 {
                output.push(sep);
            }
            trailing = true;
        }
        n %= base;
    }
    output
}
