mod ranking_flow;
mod storage_failures;
