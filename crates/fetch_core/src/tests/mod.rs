mod typed_fetch_tests;
