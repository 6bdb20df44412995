//! 翻译批次规划模块
//!
//! 把按文档顺序排列的文本单元切分为若干批次，每个批次合并为一次模型请求。
//!
//! ## 算法
//!
//! 单趟贪心扫描：
//!
//! 1. 对下一个单元计算 `added = len(text) + (批次非空时的分隔符长度)`；
//! 2. 若 `current + added > max_chars` 且当前批次已有单元，则先封闭当前批次；
//! 3. 否则加入该单元，即使它单独就超过 `max_chars`（批次必须推进，不能死循环）；
//! 4. 批次达到 `max_elements` 个单元时提前封闭。
//!
//! 由此保证：每个单元恰好属于一个批次，批次从不为空，顺序与输入一致。
//!
//! ## 使用示例
//!
//! ```rust
//! use transcraft::translation::pipeline::batch::{plan_batches, BatchLimits};
//!
//! let units = vec!["Hello".to_string(), "World".to_string()];
//! let batches = plan_batches(units, BatchLimits::new(1000, 20));
//! assert_eq!(batches.len(), 1);
//! assert_eq!(batches[0].combined_text, "Hello\n\n<<TRANSLATE_SEPARATOR>>\n\nWorld");
//! ```

use crate::translation::config::constants::BATCH_SEPARATOR;
use crate::translation::unit::Segment;

/// 批次限制
///
/// 两个值都至少为 1；传入 0 时按 1 处理，保证算法总能推进。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    /// 合并文本的最大字符数
    pub max_chars: usize,
    /// 每批最多包含的单元数
    pub max_elements: usize,
}

impl BatchLimits {
    pub fn new(max_chars: usize, max_elements: usize) -> Self {
        Self {
            max_chars: max_chars.max(1),
            max_elements: max_elements.max(1),
        }
    }
}

/// 翻译批次
///
/// `combined_text` 由各单元文本以 `\n\n<<TRANSLATE_SEPARATOR>>\n\n` 连接而成。
/// 只有当批次只含一个超长单元时，`combined_text` 才可能超过字符上限。
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<T> {
    /// 批次序号，从 0 开始
    pub index: usize,
    /// 包含的单元，保持输入顺序
    pub units: Vec<T>,
    /// 发送给模型的合并文本
    pub combined_text: String,
    /// 合并文本的字符数
    pub char_count: usize,
}

impl<T: Segment> Batch<T> {
    fn build(index: usize, units: Vec<T>, char_count: usize) -> Self {
        let combined_text = units
            .iter()
            .map(Segment::source_text)
            .collect::<Vec<_>>()
            .join(BATCH_SEPARATOR);

        Self {
            index,
            units,
            combined_text,
            char_count,
        }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// 单个单元超过字符上限的批次
    pub fn is_oversized(&self, limits: &BatchLimits) -> bool {
        self.char_count > limits.max_chars
    }

    /// 调试日志用的简短描述
    pub fn summary(&self) -> String {
        format!(
            "批次 #{}: {} 个单元, {} 字符",
            self.index + 1,
            self.units.len(),
            self.char_count
        )
    }
}

/// 按字符与数量限制切分批次
pub fn plan_batches<T: Segment>(units: Vec<T>, limits: BatchLimits) -> Vec<Batch<T>> {
    let limits = BatchLimits::new(limits.max_chars, limits.max_elements);
    let separator_len = BATCH_SEPARATOR.chars().count();

    let mut batches = Vec::new();
    let mut current: Vec<T> = Vec::new();
    let mut current_len = 0usize;

    for unit in units {
        let separator = if current.is_empty() { 0 } else { separator_len };
        let added = unit.char_len() + separator;

        if current_len + added > limits.max_chars && !current.is_empty() {
            let index = batches.len();
            batches.push(Batch::build(index, std::mem::take(&mut current), current_len));
            current_len = 0;
        }

        current_len += if current.is_empty() {
            unit.char_len()
        } else {
            added
        };
        current.push(unit);

        if current.len() >= limits.max_elements {
            let index = batches.len();
            batches.push(Batch::build(index, std::mem::take(&mut current), current_len));
            current_len = 0;
        }
    }

    if !current.is_empty() {
        let index = batches.len();
        batches.push(Batch::build(index, current, current_len));
    }

    batches
}

/// 批次规划器
///
/// 持有一次运行中固定不变的限制；运行开始时由设置与模型预算共同确定。
#[derive(Debug, Clone, Copy)]
pub struct BatchPlanner {
    limits: BatchLimits,
}

impl BatchPlanner {
    pub fn new(limits: BatchLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> BatchLimits {
        self.limits
    }

    pub fn plan<T: Segment>(&self, units: Vec<T>) -> Vec<Batch<T>> {
        let total = units.len();
        let batches = plan_batches(units, self.limits);

        let oversized = batches
            .iter()
            .filter(|b| b.is_oversized(&self.limits))
            .count();
        tracing::debug!(
            "{} 个单元分为 {} 个批次（上限 {} 字符 / {} 个元素）",
            total,
            batches.len(),
            self.limits.max_chars,
            self.limits.max_elements
        );
        if oversized > 0 {
            tracing::debug!("{} 个批次只含单个超长单元", oversized);
        }

        batches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_happy_path_single_batch() {
        let batches = plan_batches(strings(&["Hello", "World", "Foo"]), BatchLimits::new(1000, 20));
        assert_eq!(batches.len(), 1);
        assert_eq!(
            batches[0].combined_text,
            "Hello\n\n<<TRANSLATE_SEPARATOR>>\n\nWorld\n\n<<TRANSLATE_SEPARATOR>>\n\nFoo"
        );
        assert_eq!(batches[0].char_count, batches[0].combined_text.chars().count());
    }

    #[test]
    fn test_oversized_unit_gets_its_own_batch() {
        let long = "x".repeat(5000);
        let batches = plan_batches(vec![long.clone()], BatchLimits::new(1000, 20));
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].units, vec![long]);
        assert!(batches[0].is_oversized(&BatchLimits::new(1000, 20)));

        let mixed = plan_batches(
            strings(&["a", &"y".repeat(2000), "b"]),
            BatchLimits::new(1000, 20),
        );
        assert_eq!(mixed.len(), 3);
        assert_eq!(mixed[1].len(), 1);
    }

    #[test]
    fn test_element_limit_closes_batches() {
        let units: Vec<String> = (0..45).map(|i| format!("unit {}", i)).collect();
        let batches = plan_batches(units, BatchLimits::new(100_000, 20));
        let sizes: Vec<usize> = batches.iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![20, 20, 5]);
    }

    #[test]
    fn test_char_limit_counts_separators() {
        let separator = BATCH_SEPARATOR.chars().count();
        // 两个 10 字符单元加一个分隔符恰好填满
        let limit = 20 + separator;
        let batches = plan_batches(
            strings(&["aaaaaaaaaa", "bbbbbbbbbb", "c"]),
            BatchLimits::new(limit, 20),
        );
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].char_count, limit);
        assert_eq!(batches[1].combined_text, "c");
    }

    #[test]
    fn test_completeness_and_order() {
        let units: Vec<String> = (0..200)
            .map(|i| "w".repeat((i * 37) % 300 + 1))
            .collect();
        for max_chars in [1usize, 50, 333, 1000, 5000] {
            for max_elements in [1usize, 3, 20] {
                let batches = plan_batches(units.clone(), BatchLimits::new(max_chars, max_elements));
                assert!(batches.iter().all(|b| !b.is_empty()));
                let flattened: Vec<String> = batches.into_iter().flat_map(|b| b.units).collect();
                assert_eq!(flattened, units);
            }
        }
    }

    #[test]
    fn test_zero_limits_are_clamped() {
        let batches = plan_batches(strings(&["a", "b"]), BatchLimits::new(0, 0));
        assert_eq!(batches.len(), 2);
    }

    #[test]
    fn test_empty_input() {
        assert!(plan_batches(Vec::<String>::new(), BatchLimits::new(1000, 20)).is_empty());
    }

    #[test]
    fn test_multibyte_lengths_use_chars() {
        let batches = plan_batches(strings(&["繁體中文", "简体中文"]), BatchLimits::new(8, 20));
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].char_count, 4);
    }
}
