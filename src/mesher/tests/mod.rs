mod test_session_basic;
