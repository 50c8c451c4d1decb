//! 论文处理上下文
//!
//! 封装"我正在处理第几个文件"这一信息

use std::fmt::Display;

/// 论文处理上下文
#[derive(Debug, Clone)]
pub struct PaperCtx {
    /// 在本次批处理中的序号（从1开始）
    pub index: usize,

    /// 本次批处理的文件总数
    pub total: usize,

    /// 文件名（不含目录）
    pub filename: String,
}

impl PaperCtx {
    pub fn new(index: usize, total: usize, filename: impl Into<String>) -> Self {
        Self {
            index,
            total,
            filename: filename.into(),
        }
    }
}

impl Display for PaperCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}/{}] {}", self.index, self.total, self.filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let ctx = PaperCtx::new(3, 12, "paper.pdf");
        assert_eq!(ctx.to_string(), "[3/12] paper.pdf");
    }
}
