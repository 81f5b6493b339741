#[cfg(test)]
mod tests1 {
    use crate::Utils::task_parser::{
        TaskError, Value, check_document, get_bool, get_f64, get_f64_list, get_string, get_usize,
        parse_document, parse_key_value_pair, parse_name, parse_section, parse_value,
        parse_value_list,
    };

    #[test]
    fn test_parse_name() {
        let (remaining, title) = parse_name("solver\n method: rk4").unwrap();
        assert_eq!(title, "solver");
        assert_eq!(remaining, "\n method: rk4");

        let (remaining, key) = parse_name("nmax_ss: 100").unwrap();
        assert_eq!(key, "nmax_ss");
        assert_eq!(remaining, ": 100");

        assert!(parse_name("1abc").is_err());
    }

    #[test]
    fn test_parse_value() {
        let (remaining, value) = parse_value("rk4-3/8 next").unwrap();
        assert_eq!(value, Value::String("rk4-3/8".to_string()));
        assert_eq!(remaining, " next");

        let (_, value) = parse_value("1000, 2").unwrap();
        assert_eq!(value, Value::Integer(1000));

        let (_, value) = parse_value("1e-6").unwrap();
        assert_eq!(value, Value::Float(1e-6));
        assert_eq!(value.as_float(), Some(1e-6));

        let (_, value) = parse_value("false").unwrap();
        assert_eq!(value, Value::Boolean(false));
    }

    #[test]
    fn test_parse_value_list_and_pair() {
        let (remaining, values) = parse_value_list("1e-6, 1e-8 ,2 rtol: 1").unwrap();
        assert_eq!(
            values,
            vec![Value::Float(1e-6), Value::Float(1e-8), Value::Integer(2)]
        );
        assert_eq!(remaining, " rtol: 1");

        let (remaining, (key, values)) = parse_key_value_pair("method : dopri5 verbose: true").unwrap();
        assert_eq!(key, "method");
        assert_eq!(values, vec![Value::String("dopri5".to_string())]);
        assert_eq!(remaining, " verbose: true");
    }

    #[test]
    fn test_parse_section_stops_at_next_title() {
        let (remaining, (title, section)) =
            parse_section("solver method: radau5 lin_sol: dense\ntolerance atol: 1e-6").unwrap();
        assert_eq!(title, "solver");
        assert_eq!(section.len(), 2);
        assert_eq!(
            section.get("lin_sol"),
            Some(&vec![Value::String("dense".to_string())])
        );
        assert_eq!(remaining, "tolerance atol: 1e-6");
    }

    #[test]
    fn test_parse_document() {
        let doc = "
        // integration settings
        solver    method: radau5 verbose: false
        # tolerances per component
        tolerance atol: 1e-6, 1e-8 rtol: 1e-4
        step      nmax_ss: 2000
        ";
        let map = parse_document(doc).unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(get_string(&map, "solver", "method"), Some("radau5".to_string()));
        assert_eq!(get_bool(&map, "solver", "verbose").unwrap(), Some(false));
        assert_eq!(
            get_f64_list(&map, "tolerance", "atol").unwrap(),
            Some(vec![1e-6, 1e-8])
        );
        assert_eq!(get_f64(&map, "tolerance", "rtol").unwrap(), Some(1e-4));
        assert_eq!(get_usize(&map, "step", "nmax_ss").unwrap(), Some(2000));
        assert_eq!(get_usize(&map, "step", "ini_h").unwrap(), None);
        assert!(matches!(
            get_usize(&map, "tolerance", "rtol"),
            Err(TaskError::BadValue { .. })
        ));
    }

    #[test]
    fn test_repeated_sections_are_merged() {
        let map = parse_document("step ini_h: 0.1\nstep nmax_ss: 10").unwrap();
        assert_eq!(map["step"].len(), 2);
    }

    #[test]
    fn test_malformed_documents() {
        assert!(parse_document("").is_err());
        assert!(matches!(
            parse_document("solver method: rk4 ;;"),
            Err(TaskError::Remaining(_))
        ));
        let map = parse_document("solver method: rk4 colour: red").unwrap();
        let keys: &[&str] = &["method", "verbose"];
        let template = [("solver", keys)];
        assert_eq!(
            check_document(&map, &template),
            Err(TaskError::UnknownKey {
                section: "solver".to_string(),
                key: "colour".to_string()
            })
        );
        let map = parse_document("solvers method: rk4").unwrap();
        assert_eq!(
            check_document(&map, &template),
            Err(TaskError::UnknownSection("solvers".to_string()))
        );
    }
}
