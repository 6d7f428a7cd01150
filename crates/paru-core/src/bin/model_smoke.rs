use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    // 1) 模型目录：默认 model/，也可以用第一个参数指定
    let model_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("model"));

    // 2) 载入 runtime（feature_names.json / model.json / policy.json）
    let rt = paru_core::model::ModelRuntime::load_from_dir(&model_dir)?;
    println!("{rt:?}");

    // 3) 只给 9 个 given 字段，另一半由 encoder 推导
    let obj = serde_json::json!({
        "usia_tua": 1,
        "jenis_kelamin_wanita": 0,
        "merokok_pasif": 0,
        "bekerja_ya": 1,
        "rumah_tangga_ya": 1,
        "aktivitas_begadang_ya": 0,
        "aktivitas_olahraga_sering": 1,
        "asuransi_tidak": 0,
        "penyakit_bawaan_tidak": 1
    });
    let obj = obj
        .as_object()
        .ok_or_else(|| anyhow::anyhow!("sample input is not an object"))?;

    // 4) encode + build row + predict
    let feats = paru_core::features::encode(obj)?;
    for (name, v) in feats.iter() {
        println!("  {:<28} {}", name, v);
    }
    let row = rt.build_row(&feats);
    println!("row_len={}", row.len());

    let p = rt.predict_proba(&row)?;
    println!("pred_proba={:.6} prediction={}", p, rt.decide(p));
    Ok(())
}
