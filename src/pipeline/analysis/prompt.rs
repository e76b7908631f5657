/// Build the risk-analysis instruction for a lab report.
///
/// The OCR text is embedded verbatim between triple quotes.
pub fn build_risk_prompt(ocr_text: &str) -> String {
    format!(
        r#"You are a medical data analysis model. The text below was extracted by OCR from a patient's lab report.

TASK:
1. Identify each test and its current value with units.
2. Compare each value with its safe/normal range.
3. Assign a health risk percentage (integer 0-100) based on how far the value deviates from normal.
4. Give a short reason that mentions the test value.
5. Output strict JSON with exactly this structure:

{{
  "summary": "overall health risk summary sentence",
  "tests": [
    {{
      "name": "LDL Cholesterol",
      "current_value": "165 mg/dL",
      "safe_range": "<100 mg/dL",
      "risk_percent": 75,
      "risk_reason": "LDL above 130 mg/dL increases CVD risk"
    }}
  ]
}}

Return ONLY the JSON object. No markdown, no code fences, no explanations.

Lab report text:
"""{ocr_text}"""
"#
    )
}
