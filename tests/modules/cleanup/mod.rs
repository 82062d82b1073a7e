//! 清理任务集成测试
