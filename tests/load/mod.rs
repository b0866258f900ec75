mod concurrent_submissions;
